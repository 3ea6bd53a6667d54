//! Relational tree store
//!
//! One implementation for every tree table. `TreeEntity` names the columns
//! the store queries on; the rest is plain sea-orm.

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbBackend, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{department, position};
use crate::error::{AppError, AppResult};
use crate::hierarchy::{TreeNode, TreeStore};
use crate::ordering::Sequenced;

/// Column mapping of a self-referencing table
pub trait TreeEntity: EntityTrait + Send + Sync + 'static {
    type Active: ActiveModelTrait<Entity = Self>
        + ActiveModelBehavior
        + Send
        + Sync
        + for<'a> From<&'a Self::Model>;

    fn id_column() -> Self::Column;
    fn name_column() -> Self::Column;
    fn parent_column() -> Self::Column;
    fn order_column() -> Self::Column;
    fn created_column() -> Self::Column;
}

impl TreeEntity for department::Entity {
    type Active = department::ActiveModel;

    fn id_column() -> department::Column {
        department::Column::Id
    }
    fn name_column() -> department::Column {
        department::Column::Name
    }
    fn parent_column() -> department::Column {
        department::Column::ParentId
    }
    fn order_column() -> department::Column {
        department::Column::DisplayOrder
    }
    fn created_column() -> department::Column {
        department::Column::CreatedAt
    }
}

impl TreeEntity for position::Entity {
    type Active = position::ActiveModel;

    fn id_column() -> position::Column {
        position::Column::Id
    }
    fn name_column() -> position::Column {
        position::Column::Name
    }
    fn parent_column() -> position::Column {
        position::Column::ParentId
    }
    fn order_column() -> position::Column {
        position::Column::DisplayOrder
    }
    fn created_column() -> position::Column {
        position::Column::CreatedAt
    }
}

pub struct SeaTreeStore<E> {
    db: DatabaseConnection,
    _entity: PhantomData<fn() -> E>,
}

pub type DepartmentStore = SeaTreeStore<department::Entity>;
pub type PositionStore = SeaTreeStore<position::Entity>;

impl<E> SeaTreeStore<E>
where
    E: TreeEntity,
    E::Model: TreeNode + IntoActiveModel<E::Active>,
{
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    /// Row locks are only available off SQLite
    fn supports_row_locks(&self) -> bool {
        self.db.get_database_backend() != DbBackend::Sqlite
    }

    async fn name_taken<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        excluding: Option<Uuid>,
    ) -> AppResult<bool> {
        let mut query = E::find()
            .filter(Expr::expr(Func::lower(Expr::col(E::name_column()))).eq(name.to_lowercase()));
        if let Some(id) = excluding {
            query = query.filter(E::id_column().ne(id));
        }
        Ok(query.count(conn).await? > 0)
    }

    /// Insert or fully replace one row
    async fn upsert<C: ConnectionTrait>(conn: &C, node: &E::Model) -> AppResult<()> {
        let exists = E::find()
            .filter(E::id_column().eq(node.id()))
            .count(conn)
            .await?
            > 0;

        let model = <E::Active as From<&E::Model>>::from(node);
        let result = if exists {
            E::update_many()
                .set(model)
                .filter(E::id_column().eq(node.id()))
                .exec(conn)
                .await
                .map(|_| ())
        } else {
            E::insert(model).exec_without_returning(conn).await.map(|_| ())
        };
        result.map_err(|e| AppError::from_write(e, node.name()))
    }

    async fn guarded_upsert<C: ConnectionTrait>(conn: &C, node: &E::Model) -> AppResult<()> {
        if Self::name_taken(conn, node.name(), Some(node.id())).await? {
            return Err(AppError::DuplicateName(format!(
                "{} '{}' already exists",
                <E::Model as TreeNode>::KIND,
                node.name()
            )));
        }
        Self::upsert(conn, node).await
    }
}

#[async_trait]
impl<E> TreeStore<E::Model> for SeaTreeStore<E>
where
    E: TreeEntity,
    E::Model: TreeNode + IntoActiveModel<E::Active>,
{
    async fn get(&self, id: Uuid) -> AppResult<Option<E::Model>> {
        let node = E::find()
            .filter(E::id_column().eq(id))
            .one(&self.db)
            .await?;
        Ok(node)
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<E::Model>> {
        let node = E::find()
            .filter(Expr::expr(Func::lower(Expr::col(E::name_column()))).eq(name.to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(node)
    }

    async fn list_by_parent(&self, parent_id: Option<Uuid>) -> AppResult<Vec<E::Model>> {
        let query = match parent_id {
            Some(id) => E::find().filter(E::parent_column().eq(id)),
            None => E::find().filter(E::parent_column().is_null()),
        };
        let nodes = query
            .order_by_asc(E::order_column())
            .order_by_asc(E::created_column())
            .all(&self.db)
            .await?;
        Ok(nodes)
    }

    async fn list_all(&self) -> AppResult<Vec<E::Model>> {
        let nodes = E::find()
            .order_by_asc(E::order_column())
            .order_by_asc(E::created_column())
            .all(&self.db)
            .await?;
        Ok(nodes)
    }

    async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        Self::name_taken(&self.db, name, excluding).await
    }

    async fn count_by_parent(&self, parent_id: Uuid) -> AppResult<u64> {
        let count = E::find()
            .filter(E::parent_column().eq(parent_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn save(&self, node: E::Model) -> AppResult<E::Model> {
        let txn = self.db.begin().await?;
        Self::guarded_upsert(&txn, &node).await?;
        txn.commit().await?;
        Ok(node)
    }

    async fn save_all(&self, nodes: Vec<E::Model>) -> AppResult<Vec<E::Model>> {
        let txn = self.db.begin().await?;
        for node in &nodes {
            Self::guarded_upsert(&txn, node).await?;
        }
        txn.commit().await?;
        Ok(nodes)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        E::delete_many()
            .filter(E::id_column().eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> AppResult<()> {
        let txn = self.db.begin().await?;
        E::delete_many()
            .filter(E::id_column().is_in(ids.iter().copied()))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    async fn update_locked(
        &self,
        mutate: &(dyn for<'a> Fn(&'a [E::Model]) -> AppResult<Vec<E::Model>> + Send + Sync),
    ) -> AppResult<Vec<E::Model>> {
        let txn = self.db.begin().await?;

        let mut query = E::find();
        if self.supports_row_locks() {
            query = query.lock_exclusive();
        }
        let snapshot = query.all(&txn).await?;

        // Dropping the transaction on error rolls it back
        let updated = mutate(&snapshot)?;
        for node in &updated {
            if !snapshot.iter().any(|n| n.id() == node.id()) {
                return Err(AppError::NotFound(format!(
                    "{} not found with id: {}",
                    <E::Model as TreeNode>::KIND,
                    node.id()
                )));
            }
        }

        for node in &updated {
            Self::guarded_upsert(&txn, node).await?;
        }
        txn.commit().await?;
        Ok(updated)
    }
}
