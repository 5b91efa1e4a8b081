//! Group and expense management: creation, membership, expense log, and the
//! cascading group delete.
//!
//! Authorization here is deliberately thin: is-member / is-owner checks
//! only. Identity itself comes from the external auth collaborator.

use crate::domain::{
    DomainError, Expense, ExpenseId, Group, GroupId, MemberId, Message, Split,
};
use crate::ports::{ExpenseStore, GroupStore, MessageStore, UserDirectory};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Group management service. Coordinates the store ports; owns no state.
pub struct GroupService {
    groups: Arc<dyn GroupStore>,
    expenses: Arc<dyn ExpenseStore>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
}

impl GroupService {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        expenses: Arc<dyn ExpenseStore>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            groups,
            expenses,
            messages,
            users,
        }
    }

    /// Create a group. The creator becomes owner and sole initial member.
    pub async fn create_group(&self, owner: MemberId, name: &str) -> Result<Group, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Invalid("group name is empty".to_string()));
        }
        let group = self.groups.create_group(name, owner).await?;
        info!(group_id = group.id, owner, "group created");
        Ok(group)
    }

    /// Add a member by email (case-insensitive lookup in the directory).
    pub async fn add_member(
        &self,
        group_id: GroupId,
        email: &str,
    ) -> Result<Group, DomainError> {
        let member = self.users.find_by_email(email.trim()).await?;
        let group = self.groups.get_group(group_id).await?;
        if group.members.contains(&member.id) {
            return Err(DomainError::Invalid(
                "user is already a member of this group".to_string(),
            ));
        }
        let group = self.groups.add_member(group_id, member.id).await?;
        info!(group_id, member = member.id, "member added");
        Ok(group)
    }

    /// Log an expense. The actor must be a member; the amount must be a
    /// finite non-negative number. Splits are stored as given; their
    /// `share` values are display-only and settlement ignores them.
    pub async fn add_expense(
        &self,
        actor: MemberId,
        group_id: GroupId,
        title: &str,
        amount: f64,
        paid_by: MemberId,
        splits: Vec<Split>,
        date: Option<i64>,
    ) -> Result<Expense, DomainError> {
        let group = self.groups.get_group(group_id).await?;
        if !group.members.contains(&actor) {
            return Err(DomainError::Forbidden(
                "only group members can add expenses".to_string(),
            ));
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(DomainError::Invalid(format!(
                "expense amount must be non-negative, got {}",
                amount
            )));
        }

        let date = date.unwrap_or_else(|| Utc::now().timestamp_millis());
        let expense = self
            .expenses
            .add_expense(group_id, title, amount, paid_by, &splits, date)
            .await?;
        info!(group_id, expense_id = expense.id, amount, "expense added");
        Ok(expense)
    }

    /// Delete one expense. The actor must be a member and the expense must
    /// belong to the given group.
    pub async fn delete_expense(
        &self,
        actor: MemberId,
        group_id: GroupId,
        expense_id: ExpenseId,
    ) -> Result<(), DomainError> {
        let group = self.groups.get_group(group_id).await?;
        if !group.members.contains(&actor) {
            return Err(DomainError::Forbidden(
                "only group members can delete expenses".to_string(),
            ));
        }
        let expense = self.expenses.get_expense(expense_id).await?;
        if expense.group_id != group_id {
            return Err(DomainError::Forbidden(
                "expense does not belong to this group".to_string(),
            ));
        }
        self.expenses.delete_expense(expense_id).await?;
        info!(group_id, expense_id, "expense deleted");
        Ok(())
    }

    /// Delete a group and everything hanging off it. Owner only.
    ///
    /// Cascade order: expenses, then messages, then the group record itself.
    /// A failure mid-cascade leaves the group present so the delete can be
    /// retried; orphaned rows are not possible because the record goes last.
    pub async fn delete_group(
        &self,
        actor: MemberId,
        group_id: GroupId,
    ) -> Result<(), DomainError> {
        let group = self.groups.get_group(group_id).await?;
        if group.owner != actor {
            warn!(group_id, actor, owner = group.owner, "non-owner delete refused");
            return Err(DomainError::Forbidden(
                "only the owner can delete this group".to_string(),
            ));
        }

        self.expenses.delete_group_expenses(group_id).await?;
        self.messages.delete_group_messages(group_id).await?;
        self.groups.delete_group(group_id).await?;
        info!(group_id, "group deleted with expenses and messages");
        Ok(())
    }

    /// All groups the member belongs to.
    pub async fn groups_for_member(&self, member: MemberId) -> Result<Vec<Group>, DomainError> {
        self.groups.groups_for_member(member).await
    }

    /// Group detail. `NotFound` if absent.
    pub async fn group_detail(&self, group_id: GroupId) -> Result<Group, DomainError> {
        self.groups.get_group(group_id).await
    }

    /// Expense log of a group, creation order.
    pub async fn list_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, DomainError> {
        self.expenses.list_expenses(group_id).await
    }

    /// Chat history, ascending by creation time. Pre-join backlog is served
    /// here; the router never replays.
    pub async fn message_history(&self, group_id: GroupId) -> Result<Vec<Message>, DomainError> {
        self.messages.list_messages(group_id).await
    }
}
