use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::{middleware::auth::AuthUser, notify::Notification, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(stream))
}

/// SSE event for `user`, or `None` when the notification is addressed elsewhere.
fn to_event(user: &AuthUser, notification: &Notification) -> Option<Event> {
    if !notification.is_for(user) {
        return None;
    }
    Event::default()
        .event(notification.kind.as_str())
        .json_data(notification)
        .ok()
}

#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "Server-sent events addressed to the caller", content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = %user.user_id, "notification stream opened");
    // A lagging receiver reports how many events it missed; those are skipped.
    let events = BroadcastStream::new(state.notifier.subscribe()).filter_map(move |received| {
        let event = received
            .ok()
            .and_then(|notification| to_event(&user, &notification))
            .map(Ok);
        futures::future::ready(event)
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
