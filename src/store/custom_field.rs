use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use crate::custom_field::FieldStore;
use crate::entity::custom_field::{self, ActiveModel, Column, Entity};
use crate::error::{AppError, AppResult};

pub struct SeaFieldStore {
    db: DatabaseConnection,
}

impl SeaFieldStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn upsert<C: sea_orm::ConnectionTrait>(
    conn: &C,
    field: &custom_field::Model,
) -> AppResult<()> {
    let exists = Entity::find_by_id(field.id).count(conn).await? > 0;
    let model = ActiveModel::from(field);
    let result = if exists {
        model.update(conn).await.map(|_| ())
    } else {
        model.insert(conn).await.map(|_| ())
    };
    result.map_err(|e| AppError::from_write(e, &field.name))
}

#[async_trait]
impl FieldStore for SeaFieldStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<custom_field::Model>> {
        Ok(Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_all(&self) -> AppResult<Vec<custom_field::Model>> {
        let fields = Entity::find()
            .order_by_asc(Column::FieldOrder)
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(fields)
    }

    async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        let mut query = Entity::find()
            .filter(Expr::expr(Func::lower(Expr::col(Column::Name))).eq(name.to_lowercase()));
        if let Some(id) = excluding {
            query = query.filter(Column::Id.ne(id));
        }
        Ok(query.count(&self.db).await? > 0)
    }

    async fn save(&self, field: custom_field::Model) -> AppResult<custom_field::Model> {
        upsert(&self.db, &field).await?;
        Ok(field)
    }

    async fn save_all(&self, fields: Vec<custom_field::Model>) -> AppResult<Vec<custom_field::Model>> {
        let txn = self.db.begin().await?;
        for field in &fields {
            upsert(&txn, field).await?;
        }
        txn.commit().await?;
        Ok(fields)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }
}
