//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters. The persistence collaborator is trusted to
//! serialize concurrent writes; callers always see a consistent snapshot.

use crate::domain::{
    DomainError, Expense, ExpenseId, Group, GroupId, Member, MemberId, Message, Split,
};

/// Group records. Membership is a flat id set; owner is always a member.
#[async_trait::async_trait]
pub trait GroupStore: Send + Sync {
    /// Create a group owned by `owner`, with `owner` as the only member.
    async fn create_group(&self, name: &str, owner: MemberId) -> Result<Group, DomainError>;

    /// Fetch a group. `NotFound` if absent.
    async fn get_group(&self, group_id: GroupId) -> Result<Group, DomainError>;

    /// All groups the member belongs to.
    async fn groups_for_member(&self, member: MemberId) -> Result<Vec<Group>, DomainError>;

    /// Add a member to the group's set. Caller checks for duplicates.
    async fn add_member(&self, group_id: GroupId, member: MemberId) -> Result<Group, DomainError>;

    /// Delete the group record only. Cascading deletes of expenses and
    /// messages are issued separately by the use case.
    async fn delete_group(&self, group_id: GroupId) -> Result<(), DomainError>;
}

/// Expense records for a group.
#[async_trait::async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn add_expense(
        &self,
        group_id: GroupId,
        title: &str,
        amount: f64,
        paid_by: MemberId,
        splits: &[Split],
        date: i64,
    ) -> Result<Expense, DomainError>;

    /// All expenses of a group, creation order. Empty for unknown groups.
    async fn list_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, DomainError>;

    /// Fetch one expense. `NotFound` if absent.
    async fn get_expense(&self, expense_id: ExpenseId) -> Result<Expense, DomainError>;

    async fn delete_expense(&self, expense_id: ExpenseId) -> Result<(), DomainError>;

    /// Remove every expense of the group (group-deletion cascade).
    async fn delete_group_expenses(&self, group_id: GroupId) -> Result<(), DomainError>;
}

/// Message records for a group's chat.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return it with `sender_name` resolved, so the
    /// router can broadcast a fully-populated message.
    async fn save_message(
        &self,
        group_id: GroupId,
        sender: MemberId,
        content: &str,
    ) -> Result<Message, DomainError>;

    /// Chat history, ascending `created_at`. Empty for unknown groups.
    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<Message>, DomainError>;

    /// Remove every message of the group (group-deletion cascade).
    async fn delete_group_messages(&self, group_id: GroupId) -> Result<(), DomainError>;
}

/// Read-only view of the user-management collaborator's records.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch a member. `NotFound` if absent.
    async fn get_member(&self, member: MemberId) -> Result<Member, DomainError>;

    /// Case-insensitive email lookup. `NotFound` if no match.
    async fn find_by_email(&self, email: &str) -> Result<Member, DomainError>;
}
