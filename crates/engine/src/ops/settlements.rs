use sea_orm::{Condition, ConnectionTrait, QueryFilter, QueryOrder, prelude::*};
use tracing::info;

use crate::{EngineError, ResultEngine, Settlement, balances, settlements};

use super::{
    Engine,
    balances::{delete_edge, reduce_edge},
    require_id, require_positive, with_tx,
};

impl Engine {
    /// Records that `from_user_id` paid `to_user_id` and reduces the edge
    /// between them accordingly.
    ///
    /// The payment may not exceed what is owed. Settling the full amount
    /// removes the edge; either way one settlement record is appended.
    pub async fn settle_balance(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        amount: f64,
    ) -> ResultEngine<Settlement> {
        let settlement = with_tx!(self, |db_tx| {
            record_settlement(&db_tx, from_user_id, to_user_id, amount).await
        })?;
        info!(
            settlement_id = settlement.id.as_str(),
            from = from_user_id,
            to = to_user_id,
            amount,
            "settlement recorded"
        );
        Ok(settlement)
    }

    /// Settlements the user paid or received, oldest first.
    pub async fn settlements_for_user(&self, user_id: &str) -> ResultEngine<Vec<Settlement>> {
        require_id(user_id, "user_id")?;
        let models = settlements::Entity::find()
            .filter(
                Condition::any()
                    .add(settlements::Column::FromUserId.eq(user_id))
                    .add(settlements::Column::ToUserId.eq(user_id)),
            )
            .order_by_asc(settlements::Column::CreatedAt)
            .order_by_asc(settlements::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Settlement::from).collect())
    }
}

async fn record_settlement<C: ConnectionTrait>(
    db: &C,
    from_user_id: &str,
    to_user_id: &str,
    amount: f64,
) -> ResultEngine<Settlement> {
    require_id(from_user_id, "from_user_id")?;
    require_id(to_user_id, "to_user_id")?;
    if from_user_id == to_user_id {
        return Err(EngineError::SelfSettlement(from_user_id.to_string()));
    }
    require_positive(amount, "settlement amount")?;

    let existing = balances::Entity::find_by_id((from_user_id.to_string(), to_user_id.to_string()))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NoOutstandingBalance {
            from: from_user_id.to_string(),
            to: to_user_id.to_string(),
        })?;

    if amount > existing.amount {
        return Err(EngineError::ExceedsOutstandingBalance {
            from: from_user_id.to_string(),
            to: to_user_id.to_string(),
            requested: amount,
            outstanding: existing.amount,
        });
    }

    if amount == existing.amount {
        delete_edge(db, from_user_id, to_user_id).await?;
    } else {
        reduce_edge(db, from_user_id, to_user_id, amount).await?;
    }

    let settlement = Settlement::new(from_user_id, to_user_id, amount);
    settlements::Entity::insert(settlements::ActiveModel::from(&settlement))
        .exec_without_returning(db)
        .await?;

    Ok(settlement)
}
