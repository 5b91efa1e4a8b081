//! Realtime messaging router: group-scoped broadcast channels.
//!
//! Persist-then-fan-out: `submit` awaits the message store, then delivers the
//! populated message to every session joined to the group, the sender's own
//! session included (clients rely on receiving their own message back, they
//! do not locally echo).
//!
//! The routing table is owned by this struct and only mutated through its
//! methods, under one lock: join/submit/leave are atomic relative to each
//! other. Channels are pure process-local state; nothing here survives a
//! restart. History is served by `MessageStore::list_messages`, never
//! replayed through the router.

use crate::domain::{DomainError, GroupId, MemberId, Message};
use crate::ports::inbound::SessionId;
use crate::ports::MessageStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

struct RouterState {
    next_session: SessionId,
    /// Outbox per connected session. The transport owns the receiving end.
    sessions: HashMap<SessionId, mpsc::UnboundedSender<Message>>,
    /// Subscriber sets per group, created implicitly on first join.
    channels: HashMap<GroupId, Vec<SessionId>>,
}

/// Group chat router. Share via `Arc`; all methods take `&self`.
pub struct ChatRouter {
    store: Arc<dyn MessageStore>,
    state: Mutex<RouterState>,
}

impl ChatRouter {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            state: Mutex::new(RouterState {
                next_session: 1,
                sessions: HashMap::new(),
                channels: HashMap::new(),
            }),
        }
    }

    /// Register a new session. Returns its id and the receiving end of its
    /// outbox; the transport reads broadcasts from the receiver.
    pub async fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        let session = state.next_session;
        state.next_session += 1;
        state.sessions.insert(session, tx);
        debug!(session, "session connected");
        (session, rx)
    }

    /// Subscribe a session to a group's channel. Idempotent.
    ///
    /// Precondition: the caller has already authorized the session for this
    /// group via the external auth collaborator. No membership check happens
    /// here; an unauthorized join succeeds and receives broadcasts.
    pub async fn join(&self, session: SessionId, group_id: GroupId) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if !state.sessions.contains_key(&session) {
            return Err(DomainError::Invalid(format!(
                "session {} is not connected",
                session
            )));
        }
        let subscribers = state.channels.entry(group_id).or_default();
        if !subscribers.contains(&session) {
            subscribers.push(session);
            info!(session, group_id, "joined group channel");
        }
        Ok(())
    }

    /// Persist a message, then broadcast it to every subscriber of the group.
    ///
    /// The store call is the only suspension point; fan-out is fire-and-forget
    /// per recipient. A disconnect racing this call does not cancel delivery
    /// to the remaining subscribers; the message is already durable.
    /// Broadcast order within a group is persistence-completion order.
    pub async fn submit(
        &self,
        session: SessionId,
        group_id: GroupId,
        sender: MemberId,
        content: &str,
    ) -> Result<Message, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::Invalid("message content is empty".to_string()));
        }

        let message = self.store.save_message(group_id, sender, content).await?;

        let mut state = self.state.lock().await;
        let subscribers = match state.channels.get(&group_id) {
            Some(s) => s.clone(),
            None => Vec::new(),
        };
        let mut delivered = 0usize;
        let mut dead = Vec::new();
        for sub in subscribers {
            match state.sessions.get(&sub) {
                Some(tx) => {
                    if tx.send(message.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        warn!(session = sub, group_id, "outbox closed, dropping subscriber");
                        dead.push(sub);
                    }
                }
                None => dead.push(sub),
            }
        }
        // Lazy prune: a receiver dropped without leave() is removed on the
        // next broadcast that hits it.
        if !dead.is_empty() {
            if let Some(subs) = state.channels.get_mut(&group_id) {
                subs.retain(|s| !dead.contains(s));
            }
            for s in &dead {
                state.sessions.remove(s);
            }
        }

        debug!(
            session,
            group_id,
            message_id = message.id,
            delivered,
            "message broadcast"
        );
        Ok(message)
    }

    /// Drop a session from every channel and discard its outbox.
    /// Safe to call for sessions that never joined anything.
    pub async fn leave(&self, session: SessionId) {
        let mut state = self.state.lock().await;
        state.sessions.remove(&session);
        for subscribers in state.channels.values_mut() {
            subscribers.retain(|s| *s != session);
        }
        state.channels.retain(|_, subscribers| !subscribers.is_empty());
        debug!(session, "session disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory_repo::MemoryRepo;

    fn router() -> ChatRouter {
        ChatRouter::new(Arc::new(MemoryRepo::new()))
    }

    #[tokio::test]
    async fn broadcast_reaches_sender_and_peer_exactly_once() {
        let router = router();
        let (s1, mut rx1) = router.connect().await;
        let (s2, mut rx2) = router.connect().await;
        let (s3, mut rx3) = router.connect().await;
        router.join(s1, 10).await.unwrap();
        router.join(s2, 10).await.unwrap();
        router.join(s3, 20).await.unwrap();

        let sent = router.submit(s1, 10, 7, "hello").await.unwrap();

        let got1 = rx1.try_recv().unwrap();
        let got2 = rx2.try_recv().unwrap();
        assert_eq!(got1.id, sent.id);
        assert_eq!(got2.content, "hello");
        // Exactly once each.
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        // Different group hears nothing.
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let router = router();
        let (s1, mut rx1) = router.connect().await;
        router.join(s1, 5).await.unwrap();
        router.join(s1, 5).await.unwrap();

        router.submit(s1, 5, 1, "once").await.unwrap();

        assert!(rx1.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_stops_delivery_and_is_safe_when_never_joined() {
        let router = router();
        let (s1, mut rx1) = router.connect().await;
        let (s2, mut rx2) = router.connect().await;
        router.join(s1, 5).await.unwrap();
        router.join(s2, 5).await.unwrap();

        router.leave(s2).await;
        // Never-joined session id is also fine.
        router.leave(9999).await;

        router.submit(s1, 5, 1, "still here").await.unwrap();
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_requires_connected_session() {
        let router = router();
        let err = router.join(42, 5).await.unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));
    }

    #[tokio::test]
    async fn empty_content_is_rejected_without_persisting() {
        let router = ChatRouter::new(Arc::new(MemoryRepo::new()));
        let (s1, _rx1) = router.connect().await;
        router.join(s1, 3).await.unwrap();

        let err = router.submit(s1, 3, 1, "   ").await.unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));
    }

    #[tokio::test]
    async fn persist_failure_means_no_broadcast() {
        struct FailingStore;

        #[async_trait::async_trait]
        impl MessageStore for FailingStore {
            async fn save_message(
                &self,
                _group_id: GroupId,
                _sender: MemberId,
                _content: &str,
            ) -> Result<Message, DomainError> {
                Err(DomainError::Repo("disk on fire".to_string()))
            }

            async fn list_messages(
                &self,
                _group_id: GroupId,
            ) -> Result<Vec<Message>, DomainError> {
                Ok(Vec::new())
            }

            async fn delete_group_messages(&self, _group_id: GroupId) -> Result<(), DomainError> {
                Ok(())
            }
        }

        let router = ChatRouter::new(Arc::new(FailingStore));
        let (s1, mut rx1) = router.connect().await;
        router.join(s1, 1).await.unwrap();

        let err = router.submit(s1, 1, 1, "lost").await.unwrap_err();
        assert!(matches!(err, DomainError::Repo(_)));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_broadcast() {
        let router = router();
        let (s1, mut rx1) = router.connect().await;
        let (s2, rx2) = router.connect().await;
        router.join(s1, 8).await.unwrap();
        router.join(s2, 8).await.unwrap();

        drop(rx2);
        router.submit(s1, 8, 1, "first").await.unwrap();
        router.submit(s1, 8, 1, "second").await.unwrap();

        assert_eq!(rx1.try_recv().unwrap().content, "first");
        assert_eq!(rx1.try_recv().unwrap().content, "second");
    }
}
