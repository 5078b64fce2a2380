use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sql: {0}")]
    Sql(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("corrupt record `{id}`: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("record `{0}` already exists")]
    Conflict(String),
}

impl StoreError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Sql(msg) => {
                msg.contains("connection")
                    || msg.contains("timeout")
                    || msg.contains("too many clients")
                    || msg.contains("deadlock")
            }
            Self::Serialization(_) | Self::Corrupt { .. } | Self::Conflict(_) => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable(e.to_string()),
            other => Self::Sql(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Escalation raised by the state writer when storage stays down.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("state store unavailable after {rounds} failed flush rounds ({pending} writes pending)")]
    Unavailable { rounds: u32, pending: usize },
}
