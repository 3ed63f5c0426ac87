use sea_orm::{
    ActiveValue, Condition, ConnectionTrait, QueryFilter, QueryOrder,
    prelude::*,
    sea_query::{Alias, Expr, OnConflict, Query},
};
use tracing::debug;

use crate::{BalanceView, ResultEngine, balances, group_members};

use super::{Engine, require_id, require_positive};

/// Records that `debtor` owes `creditor` another `amount`.
///
/// Runs inside the caller's transaction and never commits it. The reverse
/// edge `creditor -> debtor` is consumed first, so after the call at most one
/// direction is stored for the pair and its amount is the net obligation.
/// A delta between a user and themself is a no-op.
pub async fn apply_balance_delta<C: ConnectionTrait>(
    db: &C,
    debtor: &str,
    creditor: &str,
    amount: f64,
) -> ResultEngine<()> {
    if debtor == creditor {
        return Ok(());
    }
    require_positive(amount, "amount")?;

    let reverse = balances::Entity::find_by_id((creditor.to_string(), debtor.to_string()))
        .one(db)
        .await?;

    let Some(reverse) = reverse else {
        upsert_edge(db, debtor, creditor, amount).await?;
        debug!(debtor, creditor, amount, "balance edge incremented");
        return Ok(());
    };

    if reverse.amount > amount {
        reduce_edge(db, creditor, debtor, amount).await?;
        debug!(debtor, creditor, amount, "reverse balance edge reduced");
    } else if reverse.amount < amount {
        delete_edge(db, creditor, debtor).await?;
        insert_edge(db, debtor, creditor, amount - reverse.amount).await?;
        debug!(
            debtor,
            creditor,
            amount = amount - reverse.amount,
            "reverse balance edge replaced"
        );
    } else {
        delete_edge(db, creditor, debtor).await?;
        debug!(debtor, creditor, amount, "balance edges cancelled out");
    }

    Ok(())
}

/// `INSERT .. ON CONFLICT (from, to) DO UPDATE SET amount = amount + excluded.amount`
async fn upsert_edge<C: ConnectionTrait>(
    db: &C,
    from_user_id: &str,
    to_user_id: &str,
    amount: f64,
) -> ResultEngine<()> {
    let on_conflict = OnConflict::columns([
        balances::Column::FromUserId,
        balances::Column::ToUserId,
    ])
    .value(
        balances::Column::Amount,
        Expr::col((balances::Entity, balances::Column::Amount))
            .add(Expr::col((Alias::new("excluded"), balances::Column::Amount))),
    )
    .to_owned();

    balances::Entity::insert(edge_model(from_user_id, to_user_id, amount))
        .on_conflict(on_conflict)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

async fn insert_edge<C: ConnectionTrait>(
    db: &C,
    from_user_id: &str,
    to_user_id: &str,
    amount: f64,
) -> ResultEngine<()> {
    balances::Entity::insert(edge_model(from_user_id, to_user_id, amount))
        .exec_without_returning(db)
        .await?;
    Ok(())
}

fn edge_model(from_user_id: &str, to_user_id: &str, amount: f64) -> balances::ActiveModel {
    balances::ActiveModel {
        from_user_id: ActiveValue::Set(from_user_id.to_string()),
        to_user_id: ActiveValue::Set(to_user_id.to_string()),
        amount: ActiveValue::Set(amount),
    }
}

/// `UPDATE balances SET amount = amount - by` for one ordered pair.
pub(super) async fn reduce_edge<C: ConnectionTrait>(
    db: &C,
    from_user_id: &str,
    to_user_id: &str,
    by: f64,
) -> ResultEngine<()> {
    balances::Entity::update_many()
        .col_expr(
            balances::Column::Amount,
            Expr::col(balances::Column::Amount).sub(by),
        )
        .filter(balances::Column::FromUserId.eq(from_user_id))
        .filter(balances::Column::ToUserId.eq(to_user_id))
        .exec(db)
        .await?;
    Ok(())
}

pub(super) async fn delete_edge<C: ConnectionTrait>(
    db: &C,
    from_user_id: &str,
    to_user_id: &str,
) -> ResultEngine<()> {
    balances::Entity::delete_by_id((from_user_id.to_string(), to_user_id.to_string()))
        .exec(db)
        .await?;
    Ok(())
}

/// Removes every edge whose amount dropped to zero.
pub(super) async fn purge_settled_edges<C: ConnectionTrait>(db: &C) -> ResultEngine<u64> {
    let res = balances::Entity::delete_many()
        .filter(balances::Column::Amount.lte(0.0))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

impl Engine {
    /// Every edge the user is part of, either as debtor or creditor.
    pub async fn user_balances(&self, user_id: &str) -> ResultEngine<Vec<BalanceView>> {
        require_id(user_id, "user_id")?;
        let models = balances::Entity::find()
            .filter(
                Condition::any()
                    .add(balances::Column::FromUserId.eq(user_id))
                    .add(balances::Column::ToUserId.eq(user_id)),
            )
            .order_by_asc(balances::Column::FromUserId)
            .order_by_asc(balances::Column::ToUserId)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(BalanceView::from).collect())
    }

    /// Edges whose two endpoints are both members of the group.
    pub async fn group_balances(&self, group_id: &str) -> ResultEngine<Vec<BalanceView>> {
        require_id(group_id, "group_id")?;
        let members = Query::select()
            .column(group_members::Column::UserId)
            .from(group_members::Entity)
            .and_where(group_members::Column::GroupId.eq(group_id))
            .to_owned();

        let models = balances::Entity::find()
            .filter(balances::Column::FromUserId.in_subquery(members.clone()))
            .filter(balances::Column::ToUserId.in_subquery(members))
            .order_by_asc(balances::Column::FromUserId)
            .order_by_asc(balances::Column::ToUserId)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(BalanceView::from).collect())
    }

    /// Every stored edge, ordered by pair.
    pub async fn all_balances(&self) -> ResultEngine<Vec<BalanceView>> {
        let models = balances::Entity::find()
            .order_by_asc(balances::Column::FromUserId)
            .order_by_asc(balances::Column::ToUserId)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(BalanceView::from).collect())
    }
}
