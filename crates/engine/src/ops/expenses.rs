use chrono::Utc;
use sea_orm::{ActiveValue, ConnectionTrait, QueryOrder, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{
    EngineError, Expense, ExpenseInput, ResultEngine, compute_shares, expense_splits, expenses,
};

use super::{Engine, balances::apply_balance_delta, require_id, with_tx};

impl Engine {
    /// Records an expense, its splits and the resulting balance changes.
    ///
    /// Every participant other than the payer ends up owing the payer their
    /// share. Participants are trusted to belong to the group. Returns the
    /// expense id, generated when `input.expense_id` is empty.
    pub async fn create_expense(&self, input: ExpenseInput) -> ResultEngine<String> {
        let expense_id = with_tx!(self, |db_tx| record_expense(&db_tx, input).await)?;
        info!(expense_id = expense_id.as_str(), "expense recorded");
        Ok(expense_id)
    }

    /// Loads an expense together with its splits.
    pub async fn expense(&self, expense_id: &str) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))?;
        let splits = model
            .find_related(expense_splits::Entity)
            .order_by_asc(expense_splits::Column::UserId)
            .all(&self.database)
            .await?;
        Expense::try_from((model, splits))
    }
}

async fn record_expense<C: ConnectionTrait>(db: &C, input: ExpenseInput) -> ResultEngine<String> {
    if !input.total_amount.is_finite() || input.total_amount <= 0.0 {
        return Err(EngineError::InvalidAmount(
            "total amount must be greater than 0".to_string(),
        ));
    }
    require_id(&input.paid_by, "paid_by")?;
    if input.participants.is_empty() {
        return Err(EngineError::InvalidInput(
            "at least one participant is required".to_string(),
        ));
    }

    let expense_id = if input.expense_id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        input.expense_id.clone()
    };

    expenses::Entity::insert(expenses::ActiveModel {
        id: ActiveValue::Set(expense_id.clone()),
        group_id: ActiveValue::Set(input.group_id.clone()),
        paid_by: ActiveValue::Set(input.paid_by.clone()),
        amount: ActiveValue::Set(input.total_amount),
        split_type: ActiveValue::Set(input.split_type.as_str().to_string()),
        description: ActiveValue::Set(input.description.clone()),
        created_at: ActiveValue::Set(Utc::now()),
    })
    .exec_without_returning(db)
    .await?;

    let shares = compute_shares(&input)?;

    let split_rows = shares
        .iter()
        .map(|(user_id, amount)| expense_splits::ActiveModel {
            expense_id: ActiveValue::Set(expense_id.clone()),
            user_id: ActiveValue::Set(user_id.clone()),
            amount: ActiveValue::Set(*amount),
        })
        .collect::<Vec<_>>();
    expense_splits::Entity::insert_many(split_rows)
        .exec_without_returning(db)
        .await?;

    for (user_id, amount) in &shares {
        if *user_id == input.paid_by {
            continue;
        }
        apply_balance_delta(db, user_id, &input.paid_by, *amount).await?;
    }

    Ok(expense_id)
}
