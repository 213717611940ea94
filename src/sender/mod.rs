pub mod client;
pub mod dispatcher;
pub mod recorder;
pub mod retry;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::WebhookClient;
pub use dispatcher::Dispatcher;
pub use recorder::IdempotencyRecorder;
pub use retry::{ExponentialBackoff, RetryPolicy};
pub use service::SenderService;
