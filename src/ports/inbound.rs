//! Inbound port. Transport (adapter) calls into the application.
//!
//! Each socket/HTTP entry point is a named handler behind this interface,
//! registered in the dispatcher's event table.

use crate::domain::{DomainError, MemberId};
use serde_json::Value;

/// Runtime id of a connected session. Assigned by the router on connect;
/// meaningless across restarts.
pub type SessionId = u64;

/// Identity attached to a dispatched event.
///
/// `member` is established by the external auth collaborator before any
/// event reaches a handler. Handlers trust it; none of them re-authenticate.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub session: SessionId,
    pub member: MemberId,
}

/// Input port: one named transport event.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one inbound event payload. Returns the response payload the
    /// transport relays to the caller, or a domain error to translate.
    async fn handle(&self, ctx: &SessionContext, payload: Value) -> Result<Value, DomainError>;
}
