use crate::schema::{DeliveryOutcome, Message, WebhookRequest, WebhookResponse};
use reqwest::StatusCode;
use uuid::Uuid;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// HTTP client for the external webhook. Each call carries the caller's
/// per-attempt correlation id in `X-Request-ID` and a fixed timeout
/// independent of the retry budget.
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        Self { client, url }
    }

    pub async fn deliver(&self, msg: &Message, request_id: Uuid) -> DeliveryOutcome {
        let body = WebhookRequest {
            to: msg.phone_number.clone(),
            content: msg.content.clone(),
        };

        let response = match self
            .client
            .post(&self.url)
            .header("X-Request-ID", request_id.to_string())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "webhook request failed");
                return DeliveryOutcome::Retryable;
            }
        };

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            // The endpoint may echo an external message id for idempotency
            // tracking; a missing or malformed body is still a success.
            let external_id = response
                .json::<WebhookResponse>()
                .await
                .ok()
                .and_then(|body| body.message_id);
            DeliveryOutcome::Delivered { external_id }
        } else if status.is_server_error() {
            DeliveryOutcome::Retryable
        } else {
            // 4xx, but also 3xx/1xx/other 2xx: nothing a retry can fix.
            DeliveryOutcome::Terminal
        }
    }
}
