//! In-memory tree store
//!
//! Process-local storage used for `type = "memory"` deployments and tests.
//! A single write lock makes every multi-node call atomic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult, OptionExt};

use super::{same_name, sort_siblings, TreeNode, TreeStore};

pub struct MemoryTreeStore<N> {
    nodes: RwLock<HashMap<Uuid, N>>,
}

impl<N: TreeNode> MemoryTreeStore<N> {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl<N: TreeNode> Default for MemoryTreeStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Name uniqueness backstop, ignoring nodes listed in `replacing`
fn check_unique<N: TreeNode>(
    nodes: &HashMap<Uuid, N>,
    candidate: &N,
    replacing: &HashSet<Uuid>,
) -> AppResult<()> {
    let taken = nodes.values().any(|existing| {
        existing.id() != candidate.id()
            && !replacing.contains(&existing.id())
            && same_name(existing.name(), candidate.name())
    });

    if taken {
        return Err(AppError::DuplicateName(format!(
            "{} '{}' already exists",
            N::KIND,
            candidate.name()
        )));
    }
    Ok(())
}

/// Validate a whole batch before anything is written
fn check_batch<N: TreeNode>(nodes: &HashMap<Uuid, N>, batch: &[N]) -> AppResult<()> {
    let replacing: HashSet<Uuid> = batch.iter().map(|n| n.id()).collect();
    for (index, node) in batch.iter().enumerate() {
        check_unique(nodes, node, &replacing)?;
        let clash = batch
            .iter()
            .skip(index + 1)
            .any(|other| same_name(other.name(), node.name()));
        if clash {
            return Err(AppError::DuplicateName(format!(
                "{} '{}' appears twice in batch",
                N::KIND,
                node.name()
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl<N: TreeNode> TreeStore<N> for MemoryTreeStore<N> {
    async fn get(&self, id: Uuid) -> AppResult<Option<N>> {
        let nodes = self.nodes.read().await;
        Ok(nodes.get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<N>> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .find(|n| same_name(n.name(), name))
            .cloned())
    }

    async fn list_by_parent(&self, parent_id: Option<Uuid>) -> AppResult<Vec<N>> {
        let nodes = self.nodes.read().await;
        let mut children: Vec<N> = nodes
            .values()
            .filter(|n| n.parent_id() == parent_id)
            .cloned()
            .collect();
        sort_siblings(&mut children);
        Ok(children)
    }

    async fn list_all(&self) -> AppResult<Vec<N>> {
        let nodes = self.nodes.read().await;
        let mut all: Vec<N> = nodes.values().cloned().collect();
        sort_siblings(&mut all);
        Ok(all)
    }

    async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .any(|n| Some(n.id()) != excluding && same_name(n.name(), name)))
    }

    async fn count_by_parent(&self, parent_id: Uuid) -> AppResult<u64> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .filter(|n| n.parent_id() == Some(parent_id))
            .count() as u64)
    }

    async fn save(&self, node: N) -> AppResult<N> {
        let mut nodes = self.nodes.write().await;
        check_unique(&nodes, &node, &HashSet::new())?;
        nodes.insert(node.id(), node.clone());
        Ok(node)
    }

    async fn save_all(&self, batch: Vec<N>) -> AppResult<Vec<N>> {
        let mut nodes = self.nodes.write().await;
        check_batch(&nodes, &batch)?;

        for node in &batch {
            nodes.insert(node.id(), node.clone());
        }
        Ok(batch)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut nodes = self.nodes.write().await;
        nodes.remove(&id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> AppResult<()> {
        let mut nodes = self.nodes.write().await;
        for id in ids {
            nodes.remove(id);
        }
        Ok(())
    }

    async fn update_locked(
        &self,
        mutate: &(dyn for<'a> Fn(&'a [N]) -> AppResult<Vec<N>> + Send + Sync),
    ) -> AppResult<Vec<N>> {
        let mut nodes = self.nodes.write().await;
        let snapshot: Vec<N> = nodes.values().cloned().collect();

        let updated = mutate(&snapshot)?;
        for node in &updated {
            nodes
                .get(&node.id())
                .ok_or_not_found(format!("{} not found with id: {}", N::KIND, node.id()))?;
        }
        check_batch(&nodes, &updated)?;

        for node in &updated {
            nodes.insert(node.id(), node.clone());
        }
        Ok(updated)
    }
}
