use dialoguer::{theme::ColorfulTheme, Confirm};

/// Asks for a yes/no answer, defaulting to no. A closed stdin counts as no.
pub fn confirm_action(msg: &str) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(msg)
        .default(false)
        .interact()
        .unwrap_or(false)
}
