use colored::{Color, Colorize};

const LOGO: &[&str] = &[
    r"   ██╗   ██╗██╗ ██████╗ ██╗██╗     ",
    r"   ██║   ██║██║██╔════╝ ██║██║     ",
    r"   ██║   ██║██║██║  ███╗██║██║     ",
    r"   ╚██╗ ██╔╝██║██║   ██║██║██║     ",
    r"    ╚████╔╝ ██║╚██████╔╝██║███████╗",
    r"     ╚═══╝  ╚═╝ ╚═════╝ ╚═╝╚══════╝",
];

const TAGLINE: &str = "     threshold alarms for device telemetry";

const SHADES: [Color; 6] = [
    Color::Yellow,
    Color::Yellow,
    Color::BrightYellow,
    Color::BrightWhite,
    Color::Yellow,
    Color::Yellow,
];

pub fn print_banner() {
    for (line, color) in LOGO.iter().zip(SHADES) {
        println!("{}", line.color(color).bold());
    }
    println!("{}", TAGLINE.dimmed());
}

pub fn print_version_block(version: &str) {
    print_banner();
    println!();
    for (label, value) in [
        ("Version", version.bright_yellow().bold()),
        ("   Arch", std::env::consts::ARCH.bright_white()),
        ("     OS", std::env::consts::OS.bright_white()),
    ] {
        println!("  {} {value}", label.dimmed());
    }
    println!();
}
