//! Debt graph simplification.
//!
//! Removing a user as an intermediary turns chains `X -> user -> Y` into
//! direct edges `X -> Y`. Matching is greedy over the cross product of
//! incoming and outgoing edges, both ordered by counterparty id, so the same
//! ledger always simplifies the same way. Leftover amounts that cannot be
//! matched stay on the edges to or from `user`.

use std::collections::BTreeSet;

use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use tracing::{debug, info};

use crate::{ResultEngine, balances};

use super::{
    Engine,
    balances::{apply_balance_delta, purge_settled_edges, reduce_edge},
    require_id, with_tx,
};

/// Local copy of one edge touching the user being simplified.
#[derive(Debug)]
struct Leg {
    counterparty: String,
    amount: f64,
}

/// Nets every `X -> user -> Y` chain into a direct `X -> Y` edge.
///
/// Runs inside the caller's transaction. Returns the number of transfers
/// applied.
pub async fn simplify_user_balances<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> ResultEngine<usize> {
    let mut incoming: Vec<Leg> = balances::Entity::find()
        .filter(balances::Column::ToUserId.eq(user_id))
        .order_by_asc(balances::Column::FromUserId)
        .all(db)
        .await?
        .into_iter()
        .map(|edge| Leg {
            counterparty: edge.from_user_id,
            amount: edge.amount,
        })
        .collect();

    let mut outgoing: Vec<Leg> = balances::Entity::find()
        .filter(balances::Column::FromUserId.eq(user_id))
        .order_by_asc(balances::Column::ToUserId)
        .all(db)
        .await?
        .into_iter()
        .map(|edge| Leg {
            counterparty: edge.to_user_id,
            amount: edge.amount,
        })
        .collect();

    let mut transfers = 0;
    for debtor in incoming.iter_mut() {
        for creditor in outgoing.iter_mut() {
            let transfer = debtor.amount.min(creditor.amount);
            if transfer <= 0.0 {
                continue;
            }

            reduce_edge(db, &debtor.counterparty, user_id, transfer).await?;
            reduce_edge(db, user_id, &creditor.counterparty, transfer).await?;
            let removed = purge_settled_edges(db).await?;
            if removed > 0 {
                debug!(intermediary = user_id, removed, "settled balance edges removed");
            }
            apply_balance_delta(db, &debtor.counterparty, &creditor.counterparty, transfer)
                .await?;

            debug!(
                intermediary = user_id,
                from = debtor.counterparty.as_str(),
                to = creditor.counterparty.as_str(),
                transfer,
                "balance chain shortened"
            );

            debtor.amount -= transfer;
            creditor.amount -= transfer;
            transfers += 1;
        }
    }

    Ok(transfers)
}

/// Runs [`simplify_user_balances`] for every user that appears on an edge,
/// in ascending id order. Returns the total number of transfers applied.
pub async fn simplify_balances<C: ConnectionTrait>(db: &C) -> ResultEngine<usize> {
    let debtors: Vec<String> = balances::Entity::find()
        .select_only()
        .column(balances::Column::FromUserId)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    let creditors: Vec<String> = balances::Entity::find()
        .select_only()
        .column(balances::Column::ToUserId)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    let users: BTreeSet<String> = debtors.into_iter().chain(creditors).collect();

    let mut transfers = 0;
    for user_id in &users {
        transfers += simplify_user_balances(db, user_id).await?;
    }
    Ok(transfers)
}

impl Engine {
    /// Removes `user_id` as an intermediary, in its own transaction.
    pub async fn simplify_user_balances(&self, user_id: &str) -> ResultEngine<usize> {
        require_id(user_id, "user_id")?;
        let transfers = with_tx!(self, |db_tx| simplify_user_balances(&db_tx, user_id).await)?;
        info!(user_id, transfers, "user balances simplified");
        Ok(transfers)
    }

    /// Simplifies the whole ledger in one transaction.
    pub async fn simplify_balances(&self) -> ResultEngine<usize> {
        let transfers = with_tx!(self, |db_tx| simplify_balances(&db_tx).await)?;
        info!(transfers, "balances simplified");
        Ok(transfers)
    }
}
