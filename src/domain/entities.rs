//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/socket/storage types here — these are mapped from adapters.

use serde::{Deserialize, Serialize};

/// Stable identifier assigned by the user-management collaborator.
pub type MemberId = i64;
pub type GroupId = i64;
pub type ExpenseId = i64;
pub type MessageId = i64;

/// A user as seen through the directory port. Read-only in this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
}

/// A group of members sharing expenses and a chat channel.
///
/// Invariant: `owner` is always present in `members` (established at creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub owner: MemberId,
    pub members: Vec<MemberId>,
}

/// One member's assigned liability portion for an expense.
///
/// `share` is captured at expense creation for display; settlement recomputes
/// an even split from the number of entries and never reads this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub member_id: MemberId,
    pub share: f64,
}

/// A shared expense within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub title: String,
    pub amount: f64,
    pub paid_by: MemberId,
    pub splits: Vec<Split>,
    /// When the expense happened (Unix ms). Caller-supplied, defaults to now.
    pub date: i64,
    pub created_at: i64,
}

/// A directed payment that reduces outstanding imbalance.
/// Ephemeral: computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: f64,
}

/// A transfer decorated with display names for the HTTP collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementLine {
    pub from: MemberId,
    pub from_name: String,
    pub to: MemberId,
    pub to_name: String,
    pub amount: f64,
}

/// A chat message. Immutable once created; deleted only via group cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub group_id: GroupId,
    pub sender: MemberId,
    /// Resolved at save time so broadcasts carry a fully-populated message.
    pub sender_name: String,
    pub content: String,
    pub created_at: i64,
}
