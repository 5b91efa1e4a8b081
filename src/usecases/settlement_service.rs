//! Settlement summary use case: load the group snapshot, run the engine,
//! decorate transfers with display names.
//!
//! Always recomputes from current expense state (no caching), so a summary is
//! never stale relative to the snapshot the stores hand back.

use crate::domain::{compute_settlement, DomainError, GroupId, SettlementLine};
use crate::ports::{ExpenseStore, GroupStore, UserDirectory};
use std::sync::Arc;
use tracing::info;

/// Settlement service. Pure orchestration over the store ports.
pub struct SettlementService {
    groups: Arc<dyn GroupStore>,
    expenses: Arc<dyn ExpenseStore>,
    users: Arc<dyn UserDirectory>,
}

impl SettlementService {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        expenses: Arc<dyn ExpenseStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            groups,
            expenses,
            users,
        }
    }

    /// Compute who pays whom for a group. `NotFound` if the group is absent
    /// (including after a cascade delete).
    ///
    /// Name resolution is a decoration step on top of the engine's output;
    /// a member missing from the directory falls back to its id, it never
    /// fails the summary.
    pub async fn summarize(&self, group_id: GroupId) -> Result<Vec<SettlementLine>, DomainError> {
        let group = self.groups.get_group(group_id).await?;
        let expenses = self.expenses.list_expenses(group_id).await?;

        let transfers = compute_settlement(&group.members, &expenses);

        let mut lines = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            lines.push(SettlementLine {
                from: transfer.from,
                from_name: self.display_name(transfer.from).await,
                to: transfer.to,
                to_name: self.display_name(transfer.to).await,
                amount: transfer.amount,
            });
        }

        info!(
            group_id,
            expenses = expenses.len(),
            transfers = lines.len(),
            "settlement computed"
        );
        Ok(lines)
    }

    async fn display_name(&self, member: crate::domain::MemberId) -> String {
        match self.users.get_member(member).await {
            Ok(m) => m.name,
            Err(_) => member.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory_repo::MemoryRepo;
    use crate::domain::Split;

    #[tokio::test]
    async fn summary_decorates_transfers_with_names() {
        let repo = Arc::new(MemoryRepo::new());
        let ana = repo.seed_member("Ana", "ana@example.com").await;
        let bo = repo.seed_member("Bo", "bo@example.com").await;

        let group = repo.create_group("trip", ana).await.unwrap();
        let group = repo.add_member(group.id, bo).await.unwrap();

        let splits = vec![
            Split { member_id: ana, share: 0.0 },
            Split { member_id: bo, share: 0.0 },
        ];
        repo.add_expense(group.id, "hotel", 80.0, ana, &splits, 0)
            .await
            .unwrap();

        let service = SettlementService::new(repo.clone(), repo.clone(), repo.clone());
        let lines = service.summarize(group.id).await.unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].from_name, "Bo");
        assert_eq!(lines[0].to_name, "Ana");
        assert!((lines[0].amount - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let repo = Arc::new(MemoryRepo::new());
        let service = SettlementService::new(repo.clone(), repo.clone(), repo);
        let err = service.summarize(404).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn group_with_no_expenses_summarizes_empty() {
        let repo = Arc::new(MemoryRepo::new());
        let ana = repo.seed_member("Ana", "ana@example.com").await;
        let group = repo.create_group("empty", ana).await.unwrap();

        let service = SettlementService::new(repo.clone(), repo.clone(), repo.clone());
        assert!(service.summarize(group.id).await.unwrap().is_empty());
    }
}
