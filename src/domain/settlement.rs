//! Settlement engine: turns a group's expense history into the list of
//! pairwise transfers that zero out every member's balance.
//!
//! Pure computation: no I/O, no shared state. Callers pass a snapshot of
//! members and expenses and get transfers back; recompute on every request.

use crate::domain::entities::{Expense, MemberId, Transfer};
use std::collections::HashMap;

/// Residual below this is treated as settled (absorbs floating-point drift).
pub const SETTLE_EPSILON: f64 = 0.01;

/// Compute the transfers that discharge every non-zero balance.
///
/// Balances: each expense credits `paid_by` with the full amount and debits
/// every split member `amount / splits.len()`. The stored per-split `share`
/// is display-only and ignored here. Expenses with no splits contribute
/// nothing. Sum of all balances is 0 by construction, so the greedy sweep
/// always drains both sides.
///
/// Membership is NOT validated: an expense referencing an id outside
/// `members` is tallied anyway and the id shows up in the result. Referential
/// integrity is the caller's job.
///
/// Deterministic for a given input order: members keep their slice order,
/// ids first seen in an expense are appended after them.
pub fn compute_settlement(members: &[MemberId], expenses: &[Expense]) -> Vec<Transfer> {
    let (order, balances) = accumulate_balances(members, expenses);

    // Partition in accumulator order; exact zeros drop out entirely.
    let mut debtors: Vec<(MemberId, f64)> = Vec::new();
    let mut creditors: Vec<(MemberId, f64)> = Vec::new();
    for id in order {
        let balance = balances[&id];
        if balance < 0.0 {
            debtors.push((id, balance));
        } else if balance > 0.0 {
            creditors.push((id, balance));
        }
    }

    // Greedy two-pointer sweep. Settle min(-debt, credit), advance whichever
    // side drops under the epsilon.
    let mut transfers = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < debtors.len() && j < creditors.len() {
        let settled = (-debtors[i].1).min(creditors[j].1);
        transfers.push(Transfer {
            from: debtors[i].0,
            to: creditors[j].0,
            amount: settled,
        });

        debtors[i].1 += settled;
        creditors[j].1 -= settled;

        if debtors[i].1 > -SETTLE_EPSILON {
            i += 1;
        }
        if creditors[j].1 < SETTLE_EPSILON {
            j += 1;
        }
    }

    transfers
}

/// Tally per-member balances. Returns (insertion order, id -> balance).
fn accumulate_balances(
    members: &[MemberId],
    expenses: &[Expense],
) -> (Vec<MemberId>, HashMap<MemberId, f64>) {
    let mut order: Vec<MemberId> = Vec::with_capacity(members.len());
    let mut balances: HashMap<MemberId, f64> = HashMap::with_capacity(members.len());
    for &id in members {
        if balances.insert(id, 0.0).is_none() {
            order.push(id);
        }
    }

    fn credit(
        balances: &mut HashMap<MemberId, f64>,
        order: &mut Vec<MemberId>,
        id: MemberId,
        delta: f64,
    ) {
        match balances.entry(id) {
            std::collections::hash_map::Entry::Occupied(mut e) => *e.get_mut() += delta,
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(delta);
                order.push(id);
            }
        }
    }

    for expense in expenses {
        if expense.splits.is_empty() {
            continue;
        }
        let per_share = expense.amount / expense.splits.len() as f64;

        credit(&mut balances, &mut order, expense.paid_by, expense.amount);
        for split in &expense.splits {
            credit(&mut balances, &mut order, split.member_id, -per_share);
        }
    }

    (order, balances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Split;

    fn expense(amount: f64, paid_by: MemberId, split_members: &[MemberId]) -> Expense {
        Expense {
            id: 0,
            group_id: 1,
            title: "test".to_string(),
            amount,
            paid_by,
            splits: split_members
                .iter()
                .map(|&m| Split {
                    member_id: m,
                    // Deliberately bogus: settlement must never read this.
                    share: 999.0,
                })
                .collect(),
            date: 0,
            created_at: 0,
        }
    }

    /// Net money received per member: incoming minus outgoing. A fully
    /// discharged settlement makes this equal each member's balance.
    fn net_effect(members: &[MemberId], transfers: &[Transfer]) -> HashMap<MemberId, f64> {
        let mut net: HashMap<MemberId, f64> = members.iter().map(|&m| (m, 0.0)).collect();
        for t in transfers {
            *net.entry(t.to).or_insert(0.0) += t.amount;
            *net.entry(t.from).or_insert(0.0) -= t.amount;
        }
        net
    }

    #[test]
    fn empty_group_yields_no_transfers() {
        assert!(compute_settlement(&[], &[]).is_empty());
    }

    #[test]
    fn no_expenses_yields_no_transfers() {
        assert!(compute_settlement(&[1, 2, 3], &[]).is_empty());
    }

    #[test]
    fn expense_with_no_splits_contributes_nothing() {
        let transfers = compute_settlement(&[1, 2], &[expense(100.0, 1, &[])]);
        assert!(transfers.is_empty());
    }

    #[test]
    fn single_expense_even_split() {
        // A pays 300 split across A, B, C -> A:+200, B:-100, C:-100.
        let transfers = compute_settlement(&[1, 2, 3], &[expense(300.0, 1, &[1, 2, 3])]);

        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0], Transfer { from: 2, to: 1, amount: 100.0 });
        assert_eq!(transfers[1], Transfer { from: 3, to: 1, amount: 100.0 });
    }

    #[test]
    fn share_field_is_ignored() {
        // Splits carry share=999.0 (see helper); result must still be even.
        let transfers = compute_settlement(&[1, 2], &[expense(50.0, 1, &[1, 2])]);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0], Transfer { from: 2, to: 1, amount: 25.0 });
    }

    #[test]
    fn conservation_and_no_self_transfer() {
        let members = [1, 2, 3, 4];
        let expenses = [
            expense(120.0, 1, &[1, 2, 3, 4]),
            expense(80.0, 2, &[2, 3]),
            expense(45.5, 3, &[1, 4]),
        ];
        let transfers = compute_settlement(&members, &expenses);

        for t in &transfers {
            assert_ne!(t.from, t.to);
            assert!(t.amount > 0.0);
        }

        // Transfers must cancel every balance to within epsilon.
        let (order, balances) = accumulate_balances(&members, &expenses);
        let net = net_effect(&members, &transfers);
        for id in order {
            assert!(
                (balances[&id] - net[&id]).abs() < SETTLE_EPSILON,
                "member {} left with residual {}",
                id,
                balances[&id] - net[&id]
            );
        }

        let paid: f64 = transfers.iter().map(|t| t.amount).sum();
        let owed: f64 = balances.values().filter(|b| **b > 0.0).sum();
        assert!((paid - owed).abs() < SETTLE_EPSILON);
    }

    #[test]
    fn recomputation_is_deterministic() {
        let members = [5, 9, 2, 7];
        let expenses = [
            expense(99.99, 5, &[5, 9, 2]),
            expense(10.0, 2, &[7, 9]),
        ];
        let first = compute_settlement(&members, &expenses);
        let second = compute_settlement(&members, &expenses);
        assert_eq!(first, second);
    }

    #[test]
    fn repeating_thirds_settle_within_epsilon() {
        // 100 / 3 leaves 33.33... per head; residuals must stay under 0.01.
        let members = [1, 2, 3];
        let expenses = [expense(100.0, 1, &[1, 2, 3])];
        let transfers = compute_settlement(&members, &expenses);

        let (_, balances) = accumulate_balances(&members, &expenses);
        let net = net_effect(&members, &transfers);
        for id in members {
            assert!((balances[&id] - net[&id]).abs() < SETTLE_EPSILON);
        }
    }

    #[test]
    fn members_with_zero_balance_do_not_appear() {
        // Member 3 is in the group but in no expense.
        let transfers = compute_settlement(&[1, 2, 3], &[expense(60.0, 1, &[1, 2])]);
        assert!(transfers.iter().all(|t| t.from != 3 && t.to != 3));
    }

    #[test]
    fn unknown_member_ids_are_tallied_permissively() {
        // paid_by=99 is not in members; the engine tallies it regardless.
        let transfers = compute_settlement(&[1, 2], &[expense(40.0, 99, &[1, 2])]);
        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.to == 99));
        let total: f64 = transfers.iter().map(|t| t.amount).sum();
        assert!((total - 40.0).abs() < SETTLE_EPSILON);
    }

    #[test]
    fn chained_debts_settle_with_two_transfers() {
        // B covers lunch for A+B, C covers dinner for B+C at double the price:
        // A:-10, B:+10-15=-5, C:+15 -> A->C 10, B->C 5.
        let expenses = [expense(20.0, 2, &[1, 2]), expense(30.0, 3, &[2, 3])];
        let transfers = compute_settlement(&[1, 2, 3], &expenses);
        assert_eq!(
            transfers,
            vec![
                Transfer { from: 1, to: 3, amount: 10.0 },
                Transfer { from: 2, to: 3, amount: 5.0 },
            ]
        );
    }
}
