//! Balance edges.
//!
//! A row `(from_user_id, to_user_id, amount)` means that `from_user_id` owes
//! `to_user_id` the given amount. The stored edge set always satisfies:
//!
//! - no row has `from_user_id == to_user_id`;
//! - every `amount` is strictly positive (zero nets to absence of the row);
//! - for a pair of users at most one direction is stored.
//!
//! Rows are only touched through the engine operations, which keep these
//! invariants inside a single database transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Read-only projection of a stored edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub from_user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub to_user_id: String,
    pub amount: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for BalanceView {
    fn from(model: Model) -> Self {
        Self {
            from_user_id: model.from_user_id,
            to_user_id: model.to_user_id,
            amount: model.amount,
        }
    }
}
