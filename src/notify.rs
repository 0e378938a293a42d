//! Fire-and-forget push notifications.
//!
//! Services publish onto a broadcast channel; each SSE subscriber filters the
//! shared feed down to what is addressed to it. Nothing is acknowledged or
//! replayed, and a lagging subscriber simply misses events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "user_id", rename_all = "snake_case")]
pub enum Audience {
    Admins,
    User(Uuid),
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: String,
    pub audience: Audience,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: &str, audience: Audience, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            audience,
            payload,
            at: Utc::now(),
        }
    }

    pub fn is_for(&self, user: &AuthUser) -> bool {
        match self.audience {
            Audience::Admins => user.is_admin(),
            Audience::User(id) => id == user.user_id,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn emit(&self, kind: &str, audience: Audience, payload: Value) {
        let notification = Notification::new(kind, audience, payload);
        match self.tx.send(notification) {
            Ok(receivers) => tracing::debug!(kind, receivers, "notification sent"),
            Err(_) => tracing::debug!(kind, "notification dropped, no subscribers"),
        }
    }

    pub fn to_admins(&self, kind: &str, payload: Value) {
        self.emit(kind, Audience::Admins, payload);
    }

    pub fn to_user(&self, user_id: Uuid, kind: &str, payload: Value) {
        self.emit(kind, Audience::User(user_id), payload);
    }
}
