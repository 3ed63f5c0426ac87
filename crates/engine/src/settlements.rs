//! Settlements.
//!
//! A [`Settlement`] records a real-world payment from `from_user_id` to
//! `to_user_id`. The table is append-only: rows are never updated or deleted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

impl Settlement {
    pub fn new(from_user_id: &str, to_user_id: &str, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            amount,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.clone()),
            from_user_id: ActiveValue::Set(settlement.from_user_id.clone()),
            to_user_id: ActiveValue::Set(settlement.to_user_id.clone()),
            amount: ActiveValue::Set(settlement.amount),
            created_at: ActiveValue::Set(settlement.created_at),
        }
    }
}

impl From<Model> for Settlement {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            from_user_id: model.from_user_id,
            to_user_id: model.to_user_id,
            amount: model.amount,
            created_at: model.created_at,
        }
    }
}
