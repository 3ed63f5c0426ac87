//! Expenses and their per-participant splits.
//!
//! Both are immutable once written: an expense row is inserted together with
//! its `expense_splits` rows in the transaction that also updates balances.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, SplitType, expense_splits};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    pub amount: f64,
    pub split_type: SplitType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub splits: Vec<ExpenseSplit>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSplit {
    pub user_id: String,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    pub amount: f64,
    pub split_type: String,
    pub description: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_splits::Entity")]
    ExpenseSplits,
}

impl Related<super::expense_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseSplits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<(Model, Vec<expense_splits::Model>)> for Expense {
    type Error = EngineError;

    fn try_from((model, splits): (Model, Vec<expense_splits::Model>)) -> Result<Self, Self::Error> {
        Ok(Self {
            split_type: SplitType::try_from(model.split_type.as_str())?,
            id: model.id,
            group_id: model.group_id,
            paid_by: model.paid_by,
            amount: model.amount,
            description: model.description,
            created_at: model.created_at,
            splits: splits
                .into_iter()
                .map(|split| ExpenseSplit {
                    user_id: split.user_id,
                    amount: split.amount,
                })
                .collect(),
        })
    }
}
