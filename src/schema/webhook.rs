use serde::{Deserialize, Serialize};

/// Body of the outbound POST to the webhook endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRequest {
    pub to: String,
    pub content: String,
}

/// Optional body the endpoint returns on a 202.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookResponse {
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Classification of a single delivery attempt.
///
/// - 202 is the endpoint's only success code; its body may echo an
///   external message id used for idempotency recording.
/// - transport errors and 5xx are retryable.
/// - everything else (4xx, but also 3xx/1xx/unexpected 2xx) is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { external_id: Option<String> },
    Retryable,
    Terminal,
}
