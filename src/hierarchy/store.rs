//! Tree store interface
//!
//! Durable storage of nodes keyed by id. Stores do not enforce tree
//! invariants; the only rule they apply is the name uniqueness backstop.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

use super::TreeNode;

#[async_trait]
pub trait TreeStore<N: TreeNode>: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<N>>;

    /// Case-insensitive lookup
    async fn get_by_name(&self, name: &str) -> AppResult<Option<N>>;

    /// Children of `parent_id` (roots when `None`), ordered by display order
    async fn list_by_parent(&self, parent_id: Option<Uuid>) -> AppResult<Vec<N>>;

    async fn list_all(&self) -> AppResult<Vec<N>>;

    /// Case-insensitive, optionally ignoring one node
    async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool>;

    async fn count_by_parent(&self, parent_id: Uuid) -> AppResult<u64>;

    /// Insert or fully replace
    async fn save(&self, node: N) -> AppResult<N>;

    /// Insert or replace all nodes in one transaction
    async fn save_all(&self, nodes: Vec<N>) -> AppResult<Vec<N>>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Delete all ids in one transaction
    async fn delete_many(&self, ids: &[Uuid]) -> AppResult<()>;

    /// Read every node and write back the nodes produced by `mutate`, with no
    /// other writer in between. Every written node must already exist. An
    /// error from `mutate` aborts without writing.
    async fn update_locked(
        &self,
        mutate: &(dyn for<'a> Fn(&'a [N]) -> AppResult<Vec<N>> + Send + Sync),
    ) -> AppResult<Vec<N>>;
}
