//! Application use cases. Orchestrate domain logic via ports.

pub mod chat_router;
pub mod group_service;
pub mod settlement_service;

pub use chat_router::ChatRouter;
pub use group_service::GroupService;
pub use settlement_service::SettlementService;
