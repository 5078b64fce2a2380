pub mod crypto;
pub mod nats_config;
pub mod reading;
pub mod retry;
