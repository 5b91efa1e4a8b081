//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by transport/adapter into the application
//! - Outbound: Called by application into infrastructure

pub mod inbound;
pub mod outbound;

pub use inbound::{EventHandler, SessionContext, SessionId};
pub use outbound::{ExpenseStore, GroupStore, MessageStore, UserDirectory};
