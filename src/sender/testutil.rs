use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Local stand-in for the external webhook endpoint. Responses can be
/// scripted per destination; unscripted requests get a 202 with an echoed
/// external id of `ext-<destination>`.
pub struct MockWebhook {
    pub url: String,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<HashMap<String, VecDeque<u16>>>,
    hits: Mutex<HashMap<String, u32>>,
    latency: Mutex<Option<Duration>>,
    in_flight: Mutex<(usize, usize)>, // (current, max observed)
}

impl MockWebhook {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/webhook", post(handle))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/webhook"),
            state,
        }
    }

    /// Queue status codes returned for subsequent requests to `to`; once
    /// the queue drains the endpoint answers 202 again.
    pub async fn script(&self, to: &str, statuses: &[u16]) {
        self.state
            .scripts
            .lock()
            .await
            .insert(to.to_string(), statuses.iter().copied().collect());
    }

    pub async fn hits(&self, to: &str) -> u32 {
        self.state.hits.lock().await.get(to).copied().unwrap_or(0)
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock().await = Some(latency);
    }

    pub async fn max_in_flight(&self) -> usize {
        self.state.in_flight.lock().await.1
    }
}

async fn handle(State(state): State<Arc<MockState>>, Json(req): Json<serde_json::Value>) -> Response {
    let to = req["to"].as_str().unwrap_or_default().to_string();

    {
        let mut in_flight = state.in_flight.lock().await;
        in_flight.0 += 1;
        in_flight.1 = in_flight.1.max(in_flight.0);
    }
    *state.hits.lock().await.entry(to.clone()).or_insert(0) += 1;

    let latency = *state.latency.lock().await;
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }

    let status = state
        .scripts
        .lock()
        .await
        .get_mut(&to)
        .and_then(|queue| queue.pop_front())
        .unwrap_or(202);

    state.in_flight.lock().await.0 -= 1;

    if status == 202 {
        (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "messageId": format!("ext-{to}"),
                "message": "accepted",
            })),
        )
            .into_response()
    } else {
        StatusCode::from_u16(status).unwrap().into_response()
    }
}
