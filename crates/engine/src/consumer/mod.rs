mod connection;
mod consumer_loop;
mod handler;

pub use connection::{connect_jetstream, create_pull_consumer, ensure_stream};
pub use consumer_loop::ConsumerLoop;
pub use handler::{accept_payload, extract_header, HandleError};
