pub const READINGS_STREAM: &str = "VIGIL_READINGS";
pub const READINGS_SUBJECT: &str = "vigil.readings.>";
pub const READINGS_PREFIX: &str = "vigil.readings";

pub const ALARMS_STREAM: &str = "VIGIL_ALARMS";
pub const ALARMS_SUBJECT: &str = "vigil.alarms.>";
pub const ALARMS_PREFIX: &str = "vigil.alarms";

pub const CONSUMER_NAME: &str = "vigil-engine";

pub fn readings_subject_for(device_id: &str) -> String {
    format!("{READINGS_PREFIX}.{device_id}")
}

pub fn alarms_subject_for(device_id: &str) -> String {
    format!("{ALARMS_PREFIX}.{device_id}")
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
    pub max_bytes: i64,
    pub max_age_secs: u64,
    /// Window in which JetStream drops publishes with a repeated `Nats-Msg-Id`.
    pub duplicate_window_secs: u64,
}

impl StreamConfig {
    pub fn readings() -> Self {
        Self {
            name: READINGS_STREAM.into(),
            subjects: vec![READINGS_SUBJECT.into()],
            max_bytes: 1_073_741_824,
            max_age_secs: 86400,
            duplicate_window_secs: 120,
        }
    }

    pub fn alarms() -> Self {
        Self {
            name: ALARMS_STREAM.into(),
            subjects: vec![ALARMS_SUBJECT.into()],
            max_bytes: 268_435_456,
            max_age_secs: 86400 * 7,
            duplicate_window_secs: 600,
        }
    }
}
