pub mod client;
pub mod logging;
pub mod mock_client;
pub mod stream;

pub use client::{ApiClient, ByteStream, CompletionRequest, MockStreamProducer};
