//! In-memory repository. Implements every store port over locked maps.
//!
//! Test double for the use cases and the default backend when no data dir is
//! configured. Nothing survives a restart.

use crate::domain::{
    DomainError, Expense, ExpenseId, Group, GroupId, Member, MemberId, Message, Split,
};
use crate::ports::{ExpenseStore, GroupStore, MessageStore, UserDirectory};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    members: HashMap<MemberId, Member>,
    groups: HashMap<GroupId, Group>,
    expenses: Vec<Expense>,
    messages: Vec<Message>,
}

/// All four store ports over one set of in-memory tables.
pub struct MemoryRepo {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
        }
    }

    fn fresh_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert a directory entry. The user-management collaborator owns member
    /// records in production; tests and the demo seed them through this.
    pub async fn seed_member(&self, name: &str, email: &str) -> MemberId {
        let id = self.fresh_id();
        self.tables.write().await.members.insert(
            id,
            Member {
                id,
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        id
    }
}

impl Default for MemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GroupStore for MemoryRepo {
    async fn create_group(&self, name: &str, owner: MemberId) -> Result<Group, DomainError> {
        let group = Group {
            id: self.fresh_id(),
            name: name.to_string(),
            owner,
            members: vec![owner],
        };
        self.tables
            .write()
            .await
            .groups
            .insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(&self, group_id: GroupId) -> Result<Group, DomainError> {
        self.tables
            .read()
            .await
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("group {}", group_id)))
    }

    async fn groups_for_member(&self, member: MemberId) -> Result<Vec<Group>, DomainError> {
        let tables = self.tables.read().await;
        let mut groups: Vec<Group> = tables
            .groups
            .values()
            .filter(|g| g.members.contains(&member))
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.id);
        Ok(groups)
    }

    async fn add_member(&self, group_id: GroupId, member: MemberId) -> Result<Group, DomainError> {
        let mut tables = self.tables.write().await;
        let group = tables
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| DomainError::NotFound(format!("group {}", group_id)))?;
        if !group.members.contains(&member) {
            group.members.push(member);
        }
        Ok(group.clone())
    }

    async fn delete_group(&self, group_id: GroupId) -> Result<(), DomainError> {
        self.tables.write().await.groups.remove(&group_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ExpenseStore for MemoryRepo {
    async fn add_expense(
        &self,
        group_id: GroupId,
        title: &str,
        amount: f64,
        paid_by: MemberId,
        splits: &[Split],
        date: i64,
    ) -> Result<Expense, DomainError> {
        let expense = Expense {
            id: self.fresh_id(),
            group_id,
            title: title.to_string(),
            amount,
            paid_by,
            splits: splits.to_vec(),
            date,
            created_at: Utc::now().timestamp_millis(),
        };
        self.tables.write().await.expenses.push(expense.clone());
        Ok(expense)
    }

    async fn list_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .expenses
            .iter()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn get_expense(&self, expense_id: ExpenseId) -> Result<Expense, DomainError> {
        self.tables
            .read()
            .await
            .expenses
            .iter()
            .find(|e| e.id == expense_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("expense {}", expense_id)))
    }

    async fn delete_expense(&self, expense_id: ExpenseId) -> Result<(), DomainError> {
        self.tables
            .write()
            .await
            .expenses
            .retain(|e| e.id != expense_id);
        Ok(())
    }

    async fn delete_group_expenses(&self, group_id: GroupId) -> Result<(), DomainError> {
        self.tables
            .write()
            .await
            .expenses
            .retain(|e| e.group_id != group_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryRepo {
    async fn save_message(
        &self,
        group_id: GroupId,
        sender: MemberId,
        content: &str,
    ) -> Result<Message, DomainError> {
        let mut tables = self.tables.write().await;
        let sender_name = tables
            .members
            .get(&sender)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| sender.to_string());
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            group_id,
            sender,
            sender_name,
            content: content.to_string(),
            created_at: Utc::now().timestamp_millis(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<Message>, DomainError> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages)
    }

    async fn delete_group_messages(&self, group_id: GroupId) -> Result<(), DomainError> {
        self.tables
            .write()
            .await
            .messages
            .retain(|m| m.group_id != group_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryRepo {
    async fn get_member(&self, member: MemberId) -> Result<Member, DomainError> {
        self.tables
            .read()
            .await
            .members
            .get(&member)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("member {}", member)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Member, DomainError> {
        self.tables
            .read()
            .await
            .members
            .values()
            .find(|m| m.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("no user with email {}", email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_history_is_ascending_by_creation() {
        let repo = MemoryRepo::new();
        let ana = repo.seed_member("Ana", "ana@example.com").await;

        repo.save_message(1, ana, "first").await.unwrap();
        repo.save_message(1, ana, "second").await.unwrap();
        repo.save_message(2, ana, "other group").await.unwrap();

        let history = repo.list_messages(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
        assert_eq!(history[0].sender_name, "Ana");
    }

    #[tokio::test]
    async fn unknown_sender_falls_back_to_id_string() {
        let repo = MemoryRepo::new();
        let msg = repo.save_message(1, 777, "ghost").await.unwrap();
        assert_eq!(msg.sender_name, "777");
    }

    #[tokio::test]
    async fn groups_for_member_filters_by_membership() {
        let repo = MemoryRepo::new();
        let ana = repo.seed_member("Ana", "ana@example.com").await;
        let bo = repo.seed_member("Bo", "bo@example.com").await;

        let g1 = repo.create_group("a", ana).await.unwrap();
        repo.create_group("b", bo).await.unwrap();
        repo.add_member(g1.id, bo).await.unwrap();

        let anas = repo.groups_for_member(ana).await.unwrap();
        assert_eq!(anas.len(), 1);
        let bos = repo.groups_for_member(bo).await.unwrap();
        assert_eq!(bos.len(), 2);
    }
}
