//! Users, groups and group membership.
//!
//! Plain projections: nothing here touches the balance edges.

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Query,
};
use uuid::Uuid;

use crate::{EngineError, GroupView, ResultEngine, UserView, group_members, groups, users};

use super::{Engine, normalize_required_name, require_id, with_tx};

impl Engine {
    pub async fn create_user(&self, name: &str) -> ResultEngine<UserView> {
        let name = normalize_required_name(name, "user")?;
        let user = UserView {
            id: Uuid::new_v4().to_string(),
            name,
        };
        users::Entity::insert(users::ActiveModel {
            id: ActiveValue::Set(user.id.clone()),
            name: ActiveValue::Set(user.name.clone()),
        })
        .exec_without_returning(&self.database)
        .await?;
        Ok(user)
    }

    pub async fn create_group(&self, name: &str) -> ResultEngine<GroupView> {
        let name = normalize_required_name(name, "group")?;
        let group = GroupView {
            id: Uuid::new_v4().to_string(),
            name,
        };
        groups::Entity::insert(groups::ActiveModel {
            id: ActiveValue::Set(group.id.clone()),
            name: ActiveValue::Set(group.name.clone()),
        })
        .exec_without_returning(&self.database)
        .await?;
        Ok(group)
    }

    /// Adds an existing user to an existing group.
    pub async fn add_group_member(&self, group_id: &str, user_id: &str) -> ResultEngine<()> {
        require_id(group_id, "group_id")?;
        require_id(user_id, "user_id")?;
        with_tx!(self, |db_tx| {
            require_group(&db_tx, group_id).await?;
            require_user(&db_tx, user_id).await?;

            let existing =
                group_members::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
                    .one(&db_tx)
                    .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "user {user_id} in group {group_id}"
                )));
            }

            group_members::Entity::insert(group_members::ActiveModel {
                group_id: ActiveValue::Set(group_id.to_string()),
                user_id: ActiveValue::Set(user_id.to_string()),
            })
            .exec_without_returning(&db_tx)
            .await?;
            Ok(())
        })
    }

    pub async fn users(&self) -> ResultEngine<Vec<UserView>> {
        let models = users::Entity::find()
            .order_by_asc(users::Column::Name)
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(UserView::from).collect())
    }

    pub async fn groups(&self) -> ResultEngine<Vec<GroupView>> {
        let models = groups::Entity::find()
            .order_by_asc(groups::Column::Name)
            .order_by_asc(groups::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(GroupView::from).collect())
    }

    pub async fn group_members(&self, group_id: &str) -> ResultEngine<Vec<UserView>> {
        require_id(group_id, "group_id")?;
        let members = Query::select()
            .column(group_members::Column::UserId)
            .from(group_members::Entity)
            .and_where(group_members::Column::GroupId.eq(group_id))
            .to_owned();
        let models = users::Entity::find()
            .filter(users::Column::Id.in_subquery(members))
            .order_by_asc(users::Column::Name)
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(UserView::from).collect())
    }
}

async fn require_group(db: &DatabaseTransaction, group_id: &str) -> ResultEngine<()> {
    if groups::Entity::find_by_id(group_id.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Err(EngineError::KeyNotFound(format!("group {group_id}")));
    }
    Ok(())
}

async fn require_user(db: &DatabaseTransaction, user_id: &str) -> ResultEngine<()> {
    if users::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Err(EngineError::KeyNotFound(format!("user {user_id}")));
    }
    Ok(())
}
