use crate::schema::Message;
use crate::sender::SenderService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

/// Control surface for the sender: start/stop the scheduler and list
/// delivered messages.
pub fn router(sender: Arc<SenderService>) -> Router {
    Router::new()
        .route("/start", post(start_sender))
        .route("/stop", post(stop_sender))
        .route("/messages", get(list_messages))
        .with_state(sender)
}

async fn start_sender(State(sender): State<Arc<SenderService>>) -> StatusCode {
    sender.start().await;
    StatusCode::OK
}

async fn stop_sender(State(sender): State<Arc<SenderService>>) -> StatusCode {
    sender.stop().await;
    StatusCode::OK
}

async fn list_messages(
    State(sender): State<Arc<SenderService>>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    match sender.list_delivered().await {
        Ok(messages) => Ok(Json(messages)),
        Err(e) => {
            tracing::error!(error = %e, "failed to list delivered messages");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
