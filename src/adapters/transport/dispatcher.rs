//! Transport-facing event table. Maps named events to handlers so any socket
//! technology can drive the core without knowing its types.
//!
//! The subscriber registry stays inside `ChatRouter`; this layer only
//! translates payloads and relays calls. Events: `join_group`,
//! `send_message`. Disconnects arrive out-of-band via [`EventDispatcher::disconnect`].

use crate::domain::DomainError;
use crate::ports::inbound::{EventHandler, SessionContext, SessionId};
use crate::usecases::ChatRouter;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

fn require_i64(payload: &Value, field: &str) -> Result<i64, DomainError> {
    payload
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| DomainError::Invalid(format!("missing or non-integer field '{}'", field)))
}

fn require_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, DomainError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::Invalid(format!("missing or non-string field '{}'", field)))
}

/// `join_group { group_id }`: subscribe the session to a group channel.
///
/// Precondition (trusted-caller boundary): the transport has already
/// authorized this session for the group.
struct JoinGroupHandler {
    router: Arc<ChatRouter>,
}

#[async_trait::async_trait]
impl EventHandler for JoinGroupHandler {
    async fn handle(&self, ctx: &SessionContext, payload: Value) -> Result<Value, DomainError> {
        let group_id = require_i64(&payload, "group_id")?;
        self.router.join(ctx.session, group_id).await?;
        Ok(json!({ "joined": group_id }))
    }
}

/// `send_message { group_id, content }`: persist then broadcast.
///
/// The sender identity comes from the session context, never from the
/// payload; a client cannot speak as someone else.
struct SendMessageHandler {
    router: Arc<ChatRouter>,
}

#[async_trait::async_trait]
impl EventHandler for SendMessageHandler {
    async fn handle(&self, ctx: &SessionContext, payload: Value) -> Result<Value, DomainError> {
        let group_id = require_i64(&payload, "group_id")?;
        let content = require_str(&payload, "content")?;
        let message = self
            .router
            .submit(ctx.session, group_id, ctx.member, content)
            .await?;
        serde_json::to_value(message).map_err(|e| DomainError::Repo(e.to_string()))
    }
}

/// Event table: name -> handler. Built once at wiring time and shared with
/// the transport adapter.
pub struct EventDispatcher {
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
    router: Arc<ChatRouter>,
}

impl EventDispatcher {
    /// Build the table with the chat events registered.
    pub fn new(router: Arc<ChatRouter>) -> Self {
        let mut handlers: HashMap<&'static str, Arc<dyn EventHandler>> = HashMap::new();
        handlers.insert(
            "join_group",
            Arc::new(JoinGroupHandler {
                router: Arc::clone(&router),
            }),
        );
        handlers.insert(
            "send_message",
            Arc::new(SendMessageHandler {
                router: Arc::clone(&router),
            }),
        );
        Self { handlers, router }
    }

    /// Register an additional named handler. Replaces any previous handler
    /// under the same name.
    pub fn register(&mut self, event: &'static str, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(event, handler);
    }

    /// Route one inbound event to its handler.
    pub async fn dispatch(
        &self,
        ctx: &SessionContext,
        event: &str,
        payload: Value,
    ) -> Result<Value, DomainError> {
        let handler = self
            .handlers
            .get(event)
            .ok_or_else(|| DomainError::NotFound(format!("no handler for event '{}'", event)))?;
        debug!(session = ctx.session, member = ctx.member, event, "dispatching");
        handler.handle(ctx, payload).await
    }

    /// Transport-level disconnect: unsubscribe the session everywhere.
    pub async fn disconnect(&self, session: SessionId) {
        self.router.leave(session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory_repo::MemoryRepo;

    async fn dispatcher() -> (EventDispatcher, Arc<ChatRouter>) {
        let repo = Arc::new(MemoryRepo::new());
        let router = Arc::new(ChatRouter::new(repo));
        (EventDispatcher::new(Arc::clone(&router)), router)
    }

    #[tokio::test]
    async fn join_and_send_round_trip() {
        let (dispatcher, router) = dispatcher().await;
        let (session, mut rx) = router.connect().await;
        let ctx = SessionContext { session, member: 42 };

        let joined = dispatcher
            .dispatch(&ctx, "join_group", json!({ "group_id": 7 }))
            .await
            .unwrap();
        assert_eq!(joined["joined"], 7);

        let sent = dispatcher
            .dispatch(&ctx, "send_message", json!({ "group_id": 7, "content": "hi" }))
            .await
            .unwrap();
        assert_eq!(sent["content"], "hi");
        assert_eq!(sent["sender"], 42);

        // Sender receives its own broadcast back.
        assert_eq!(rx.try_recv().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let (dispatcher, router) = dispatcher().await;
        let (session, _rx) = router.connect().await;
        let ctx = SessionContext { session, member: 1 };

        let err = dispatcher
            .dispatch(&ctx, "upload_sticker", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_payload_is_invalid() {
        let (dispatcher, router) = dispatcher().await;
        let (session, _rx) = router.connect().await;
        let ctx = SessionContext { session, member: 1 };

        let err = dispatcher
            .dispatch(&ctx, "join_group", json!({ "group_id": "seven" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));

        let err = dispatcher
            .dispatch(&ctx, "send_message", json!({ "group_id": 7 }))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));
    }

    #[tokio::test]
    async fn disconnect_unsubscribes_session() {
        let (dispatcher, router) = dispatcher().await;
        let (s1, mut rx1) = router.connect().await;
        let (s2, mut rx2) = router.connect().await;
        for s in [s1, s2] {
            let ctx = SessionContext { session: s, member: 1 };
            dispatcher
                .dispatch(&ctx, "join_group", json!({ "group_id": 3 }))
                .await
                .unwrap();
        }

        dispatcher.disconnect(s2).await;

        let ctx = SessionContext { session: s1, member: 1 };
        dispatcher
            .dispatch(&ctx, "send_message", json!({ "group_id": 3, "content": "left?" }))
            .await
            .unwrap();
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }
}
