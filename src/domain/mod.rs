//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod settlement;

pub use entities::{
    Expense, ExpenseId, Group, GroupId, Member, MemberId, Message, MessageId, SettlementLine,
    Split, Transfer,
};
pub use errors::DomainError;
pub use settlement::compute_settlement;
