//! Hierarchy service
//!
//! All tree-mutating rules live here: name uniqueness, parent existence,
//! cycle prevention and the delete guards. Stores are plain persistence.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult, OptionExt};
use crate::ordering::{next_sequence, resequence, validate_sequence};

use super::{same_name, NodeInput, TreeNode, TreeStore, UsageCounter};

/// Longest accepted node name, matching the column width
pub const MAX_NAME_LEN: usize = 100;

/// Aggregate figures over one tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub root_count: u64,
    pub child_count: u64,
    /// Hops from a root to its deepest node; lone roots have depth 0
    pub max_depth: u32,
    /// Active nodes grouped by category (position level)
    pub by_category: BTreeMap<String, u64>,
}

#[derive(Clone)]
pub struct HierarchyService<N: TreeNode> {
    store: Arc<dyn TreeStore<N>>,
    usage: Arc<dyn UsageCounter<N>>,
}

fn validate_name(name: &str) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("name must not be blank".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must not exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Parent id -> children, built from a flat snapshot
fn children_index<N: TreeNode>(nodes: &[N]) -> HashMap<Option<Uuid>, Vec<&N>> {
    let mut index: HashMap<Option<Uuid>, Vec<&N>> = HashMap::new();
    for node in nodes {
        index.entry(node.parent_id()).or_default().push(node);
    }
    index
}

/// Ids strictly below `root` in the snapshot
fn subtree_ids<N: TreeNode>(nodes: &[N], root: Uuid) -> HashSet<Uuid> {
    let index = children_index(nodes);
    let mut seen = HashSet::new();
    let mut stack = vec![root];

    while let Some(current) = stack.pop() {
        for child in index.get(&Some(current)).into_iter().flatten() {
            if seen.insert(child.id()) {
                stack.push(child.id());
            }
        }
    }
    seen
}

/// Reject a parent change that would dangle or close a cycle
fn check_reparent<N: TreeNode>(nodes: &[N], id: Uuid, new_parent: Option<Uuid>) -> AppResult<()> {
    let Some(parent_id) = new_parent else {
        return Ok(());
    };

    if parent_id == id {
        return Err(AppError::InvalidOperation(format!(
            "circular reference: {} cannot be its own parent",
            N::KIND
        )));
    }
    if !nodes.iter().any(|n| n.id() == parent_id) {
        return Err(AppError::NotFound(format!(
            "Parent {} not found with id: {}",
            N::KIND,
            parent_id
        )));
    }
    if subtree_ids(nodes, id).contains(&parent_id) {
        return Err(AppError::InvalidOperation(format!(
            "circular reference: {} {} is a descendant of {}",
            N::KIND,
            parent_id,
            id
        )));
    }
    Ok(())
}

fn locate<N: TreeNode>(nodes: &[N], id: Uuid) -> AppResult<N> {
    nodes
        .iter()
        .find(|n| n.id() == id)
        .cloned()
        .ok_or_not_found(format!("{} not found with id: {}", N::KIND, id))
}

impl<N: TreeNode> HierarchyService<N> {
    pub fn new(store: Arc<dyn TreeStore<N>>, usage: Arc<dyn UsageCounter<N>>) -> Self {
        Self { store, usage }
    }

    // ---- reads ----

    pub async fn get(&self, id: Uuid) -> AppResult<N> {
        self.store
            .get(id)
            .await?
            .ok_or_not_found(format!("{} not found with id: {}", N::KIND, id))
    }

    pub async fn get_by_name(&self, name: &str) -> AppResult<N> {
        self.store
            .get_by_name(name)
            .await?
            .ok_or_not_found(format!("{} not found with name: {}", N::KIND, name))
    }

    pub async fn list_all(&self) -> AppResult<Vec<N>> {
        self.store.list_all().await
    }

    pub async fn list_roots(&self) -> AppResult<Vec<N>> {
        self.store.list_by_parent(None).await
    }

    pub async fn list_children(&self, parent_id: Uuid) -> AppResult<Vec<N>> {
        self.get(parent_id).await?;
        self.store.list_by_parent(Some(parent_id)).await
    }

    pub async fn list_active(&self) -> AppResult<Vec<N>> {
        let all = self.store.list_all().await?;
        Ok(all.into_iter().filter(|n| n.is_active()).collect())
    }

    /// Case-insensitive substring match on name or description
    pub async fn search(&self, query: &str) -> AppResult<Vec<N>> {
        let needle = query.trim().to_lowercase();
        let all = self.store.list_all().await?;
        if needle.is_empty() {
            return Ok(all);
        }

        Ok(all
            .into_iter()
            .filter(|n| {
                n.name().to_lowercase().contains(&needle)
                    || n
                        .description()
                        .map_or(false, |d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Active nodes without active children.
    ///
    /// With `under`, walks that subtree only and skips inactive branches.
    pub async fn leaves(&self, under: Option<Uuid>) -> AppResult<Vec<N>> {
        let all = self.store.list_all().await?;
        let index = children_index(&all);
        let has_active_child =
            |id: Uuid| index.get(&Some(id)).map_or(false, |c| c.iter().any(|n| n.is_active()));

        let Some(root) = under else {
            return Ok(all
                .iter()
                .filter(|n| n.is_active() && !has_active_child(n.id()))
                .cloned()
                .collect());
        };

        self.get(root).await?;
        let mut leaves = Vec::new();
        let mut visited = HashSet::from([root]);
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let children = index.get(&Some(current)).into_iter().flatten();
            for child in children.filter(|n| n.is_active()) {
                if !visited.insert(child.id()) {
                    return Err(self.cycle_fault(child.id()));
                }
                if has_active_child(child.id()) {
                    stack.push(child.id());
                } else {
                    leaves.push((*child).clone());
                }
            }
        }
        Ok(leaves)
    }

    pub async fn children_count(&self, id: Uuid) -> AppResult<u64> {
        self.store.count_by_parent(id).await
    }

    /// Live usage count from the usage collaborator
    pub async fn usage_count(&self, node: &N) -> AppResult<u64> {
        self.usage.count_usages(node).await
    }

    // ---- traversal ----

    /// Every node below `id`, breadth first
    pub async fn descendants(&self, id: Uuid) -> AppResult<Vec<N>> {
        self.get(id).await?;
        tracing::debug!("Collecting descendants of {} {}", N::KIND, id);

        let mut result = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for child in self.store.list_by_parent(Some(current)).await? {
                if !visited.insert(child.id()) {
                    return Err(self.cycle_fault(child.id()));
                }
                queue.push_back(child.id());
                result.push(child);
            }
        }
        Ok(result)
    }

    /// Parent chain of `id`, root first
    pub async fn ancestors(&self, id: Uuid) -> AppResult<Vec<N>> {
        let node = self.get(id).await?;

        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut next = node.parent_id();

        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                return Err(self.cycle_fault(parent_id));
            }
            let parent = self.store.get(parent_id).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "{} {} references missing parent {}",
                    N::KIND,
                    id,
                    parent_id
                ))
            })?;
            next = parent.parent_id();
            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Whether `candidate_id` lies anywhere below `ancestor_id`
    pub async fn is_descendant(&self, ancestor_id: Uuid, candidate_id: Uuid) -> AppResult<bool> {
        self.get(candidate_id).await?;
        let below = self.descendants(ancestor_id).await?;
        Ok(below.iter().any(|n| n.id() == candidate_id))
    }

    pub async fn statistics(&self) -> AppResult<HierarchyStats> {
        let all = self.store.list_all().await?;
        let index = children_index(&all);

        let total = all.len() as u64;
        let active = all.iter().filter(|n| n.is_active()).count() as u64;
        let root_count = index.get(&None).map_or(0, |r| r.len()) as u64;

        // Layered walk from the roots; anything left unvisited is detached
        let mut max_depth = 0u32;
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut layer: Vec<Uuid> = index
            .get(&None)
            .map(|roots| roots.iter().map(|n| n.id()).collect())
            .unwrap_or_default();
        let mut depth = 0u32;

        while !layer.is_empty() {
            max_depth = depth;
            let mut next_layer = Vec::new();
            for id in layer {
                if !visited.insert(id) {
                    return Err(self.cycle_fault(id));
                }
                for child in index.get(&Some(id)).into_iter().flatten() {
                    next_layer.push(child.id());
                }
            }
            layer = next_layer;
            depth += 1;
        }

        if visited.len() != all.len() {
            return Err(AppError::Internal(format!(
                "{} {} nodes are not reachable from any root",
                all.len() - visited.len(),
                N::KIND
            )));
        }

        let mut by_category = BTreeMap::new();
        for category in all.iter().filter(|n| n.is_active()).filter_map(|n| n.category()) {
            *by_category.entry(category).or_insert(0u64) += 1;
        }

        Ok(HierarchyStats {
            total,
            active,
            inactive: total - active,
            root_count,
            child_count: total - root_count,
            max_depth,
            by_category,
        })
    }

    // ---- mutations ----

    pub async fn create(&self, input: N::Input) -> AppResult<N> {
        validate_name(input.name())?;
        input.validate()?;

        if self.store.exists_by_name(input.name(), None).await? {
            return Err(AppError::DuplicateName(format!(
                "{} '{}' already exists",
                N::KIND,
                input.name()
            )));
        }

        if let Some(parent_id) = input.parent_id() {
            self.store.get(parent_id).await?.ok_or_not_found(format!(
                "Parent {} not found with id: {}",
                N::KIND,
                parent_id
            ))?;
        }

        let display_order = match input.display_order() {
            Some(order) => order,
            None => {
                let siblings = self.store.list_by_parent(input.parent_id()).await?;
                next_sequence(&siblings)
            }
        };

        let node = N::build(Uuid::new_v4(), &input, display_order, Utc::now());
        let saved = self.store.save(node).await?;

        tracing::info!("Created {} {} '{}'", N::KIND, saved.id(), saved.name());
        Ok(saved)
    }

    /// Overwrite a node from `input`.
    ///
    /// The node is rebuilt from the locked snapshot, so a parent written by a
    /// concurrent move is never overwritten with a stale one.
    pub async fn update(&self, id: Uuid, input: N::Input) -> AppResult<N> {
        validate_name(input.name())?;
        input.validate()?;

        let saved = self
            .write_one(&|nodes: &[N]| -> AppResult<N> {
                let mut node = locate(nodes, id)?;
                let taken = nodes
                    .iter()
                    .any(|n| n.id() != id && same_name(n.name(), input.name()));
                if taken {
                    return Err(AppError::DuplicateName(format!(
                        "{} '{}' already exists",
                        N::KIND,
                        input.name()
                    )));
                }
                if input.parent_id() != node.parent_id() {
                    check_reparent(nodes, id, input.parent_id())?;
                }
                node.apply(&input, Utc::now());
                Ok(node)
            })
            .await?;

        tracing::info!("Updated {} {} '{}'", N::KIND, saved.id(), saved.name());
        Ok(saved)
    }

    /// Re-parent a node; `None` detaches it to a root.
    ///
    /// Sibling display orders are left as they are.
    pub async fn move_node(&self, id: Uuid, new_parent: Option<Uuid>) -> AppResult<N> {
        let moved = self
            .write_one(&|nodes: &[N]| -> AppResult<N> {
                let mut node = locate(nodes, id)?;
                check_reparent(nodes, id, new_parent)?;
                node.set_parent_id(new_parent, Utc::now());
                Ok(node)
            })
            .await?;

        tracing::info!(
            "Moved {} {} '{}' under {:?}",
            N::KIND,
            moved.id(),
            moved.name(),
            new_parent
        );
        Ok(moved)
    }

    /// Delete a node without children or live usages. Never cascades.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let node = self.get(id).await?;
        self.check_deletable(&node, &HashSet::new()).await?;

        self.store.delete(id).await?;
        tracing::info!("Deleted {} {} '{}'", N::KIND, id, node.name());
        Ok(())
    }

    /// All-or-nothing delete.
    ///
    /// Ids are checked in the given order; children listed earlier in the
    /// same batch count as already deleted. The first rejection aborts the
    /// whole batch and nothing is removed.
    pub async fn bulk_delete(&self, ids: &[Uuid]) -> AppResult<usize> {
        if ids.is_empty() {
            return Err(AppError::Validation("no ids given".to_string()));
        }

        let mut pending: HashSet<Uuid> = HashSet::with_capacity(ids.len());
        for &id in ids {
            if pending.contains(&id) {
                return Err(AppError::InvalidOperation(format!(
                    "id {} appears more than once",
                    id
                )));
            }
            let node = self.get(id).await?;
            self.check_deletable(&node, &pending).await?;
            pending.insert(id);
        }

        self.store.delete_many(ids).await?;
        tracing::info!("Deleted {} {} nodes in one batch", ids.len(), N::KIND);
        Ok(ids.len())
    }

    /// Assign `index + 1` to each id in the given order, in one write.
    ///
    /// Ids missing from the list keep their current order value.
    pub async fn reorder(&self, ids: &[Uuid]) -> AppResult<Vec<N>> {
        validate_sequence(ids)?;

        let saved = self
            .store
            .update_locked(&|nodes: &[N]| -> AppResult<Vec<N>> {
                let picked = ids
                    .iter()
                    .map(|&id| locate(nodes, id))
                    .collect::<AppResult<Vec<N>>>()?;
                resequence(ids, picked)
            })
            .await?;

        tracing::info!("Reordered {} {} nodes", saved.len(), N::KIND);
        Ok(saved)
    }

    /// Recompute the cached usage count from the live one
    pub async fn refresh_usage_count(&self, id: Uuid) -> AppResult<N> {
        let node = self.get(id).await?;
        let live = self.usage.count_usages(&node).await?;
        let count = i32::try_from(live).unwrap_or(i32::MAX);

        let saved = self
            .write_one(&|nodes: &[N]| -> AppResult<N> {
                let mut fresh = locate(nodes, id)?;
                fresh.set_usage_count(count, Utc::now());
                Ok(fresh)
            })
            .await?;

        tracing::debug!("Refreshed usage count of {} {}: {}", N::KIND, id, live);
        Ok(saved)
    }

    /// Rebuild one node from the locked snapshot and write it back
    pub(crate) async fn write_one(
        &self,
        mutate: &(dyn for<'a> Fn(&'a [N]) -> AppResult<N> + Send + Sync),
    ) -> AppResult<N> {
        let mut written = self
            .store
            .update_locked(&|nodes: &[N]| -> AppResult<Vec<N>> { Ok(vec![mutate(nodes)?]) })
            .await?;
        written
            .pop()
            .ok_or_else(|| AppError::Internal(format!("{} write returned no node", N::KIND)))
    }

    async fn check_deletable(&self, node: &N, pending: &HashSet<Uuid>) -> AppResult<()> {
        let children = self.store.list_by_parent(Some(node.id())).await?;
        if children.iter().any(|c| !pending.contains(&c.id())) {
            tracing::warn!(
                "Refusing to delete {} {} '{}': has children",
                N::KIND,
                node.id(),
                node.name()
            );
            return Err(AppError::Conflict(format!(
                "{} '{}' has children",
                N::KIND,
                node.name()
            )));
        }

        let usages = self.usage.count_usages(node).await?;
        if usages > 0 {
            tracing::warn!(
                "Refusing to delete {} {} '{}': in use by {} records",
                N::KIND,
                node.id(),
                node.name(),
                usages
            );
            return Err(AppError::Conflict(format!(
                "{} '{}' is in use by {} employees",
                N::KIND,
                node.name(),
                usages
            )));
        }
        Ok(())
    }

    fn cycle_fault(&self, id: Uuid) -> AppError {
        tracing::error!("Cycle detected in stored {} data at {}", N::KIND, id);
        AppError::Internal(format!("{} hierarchy contains a cycle at {}", N::KIND, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::department::{self, DepartmentInput};
    use crate::entity::position::{self, PositionInput, PositionLevel};
    use crate::hierarchy::{MemoryTreeStore, MemoryUsage};
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    type Departments = HierarchyService<department::Model>;

    fn departments() -> (Departments, Arc<MemoryUsage>) {
        let usage = Arc::new(MemoryUsage::new());
        let service = HierarchyService::new(
            Arc::new(MemoryTreeStore::<department::Model>::new()),
            usage.clone(),
        );
        (service, usage)
    }

    fn input(name: &str, parent_id: Option<Uuid>) -> DepartmentInput {
        DepartmentInput {
            name: name.to_string(),
            parent_id,
            ..Default::default()
        }
    }

    /// Every node reaches a root within `total` hops
    async fn assert_acyclic(service: &Departments) {
        let all = service.list_all().await.unwrap();
        let by_id: HashMap<Uuid, &department::Model> = all.iter().map(|n| (n.id, n)).collect();

        for node in &all {
            let mut hops = 0;
            let mut next = node.parent_id;
            while let Some(parent) = next {
                hops += 1;
                assert!(hops <= all.len(), "cycle through {}", node.name);
                next = by_id.get(&parent).expect("dangling parent").parent_id;
            }
        }
    }

    #[tokio::test]
    async fn test_create_appends_after_siblings() {
        let (service, _) = departments();
        let hq = service.create(input("HQ", None)).await.unwrap();

        let mut pinned = input("Pinned", Some(hq.id));
        pinned.display_order = Some(7);
        service.create(pinned).await.unwrap();

        let next = service.create(input("Next", Some(hq.id))).await.unwrap();
        assert_eq!(next.display_order, 8);
        assert_eq!(service.get(next.id).await.unwrap().display_order, 8);

        // Another parent scope starts from 1
        let other = service.create(input("Other", Some(next.id))).await.unwrap();
        assert_eq!(other.display_order, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let (service, _) = departments();
        service.create(input("Sales", None)).await.unwrap();

        let result = service.create(input("Sales", None)).await;
        assert!(matches!(result, Err(AppError::DuplicateName(_))));

        // Names are flat across the whole tree, regardless of case
        let root = service.create(input("Root", None)).await.unwrap();
        let result = service.create(input("sales", Some(root.id))).await;
        assert!(matches!(result, Err(AppError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (service, _) = departments();

        let result = service.create(input("   ", None)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service.create(input(&"x".repeat(MAX_NAME_LEN + 1), None)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service.create(input("Orphan", Some(Uuid::new_v4()))).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_with_same_fields_round_trips() {
        let (service, _) = departments();
        let hq = service.create(input("HQ", None)).await.unwrap();
        let created = service
            .create(DepartmentInput {
                name: "Finance".to_string(),
                description: Some("Money".to_string()),
                parent_id: Some(hq.id),
                manager_id: Some(Uuid::new_v4()),
                display_order: None,
            })
            .await
            .unwrap();

        let same = DepartmentInput {
            name: created.name.clone(),
            description: created.description.clone(),
            parent_id: created.parent_id,
            manager_id: created.manager_id,
            display_order: None,
        };
        let mut updated = service.update(created.id, same).await.unwrap();

        assert!(updated.updated_at >= created.updated_at);
        updated.updated_at = created.updated_at;
        assert_eq!(updated, created);
    }

    #[tokio::test]
    async fn test_update_rejects_conflicts() {
        let (service, _) = departments();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", Some(a.id))).await.unwrap();

        let result = service.update(Uuid::new_v4(), input("Z", None)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = service.update(b.id, input("a", Some(a.id))).await;
        assert!(matches!(result, Err(AppError::DuplicateName(_))));

        // Renaming to its own name in another case is fine
        assert_ok!(service.update(b.id, input("b", Some(a.id))).await);

        // Re-parenting through update runs the cycle check
        let result = service.update(a.id, input("A", Some(b.id))).await;
        assert!(matches!(result, Err(AppError::InvalidOperation(_))));

        let result = service.update(a.id, input("A", Some(Uuid::new_v4()))).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_move_into_descendant_is_rejected() {
        let (service, _) = departments();
        let hq = service.create(input("HQ", None)).await.unwrap();
        let eng = service.create(input("Engineering", Some(hq.id))).await.unwrap();
        let backend = service.create(input("Backend", Some(eng.id))).await.unwrap();

        let result = service.move_node(hq.id, Some(backend.id)).await;
        assert!(matches!(result, Err(AppError::InvalidOperation(_))));

        let result = service.move_node(eng.id, Some(eng.id)).await;
        assert!(matches!(result, Err(AppError::InvalidOperation(_))));

        let result = service.move_node(eng.id, Some(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = service.move_node(Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Nothing changed
        assert_eq!(service.get(hq.id).await.unwrap().parent_id, None);
        assert_acyclic(&service).await;
    }

    #[tokio::test]
    async fn test_move_updates_parent_and_keeps_order() {
        let (service, _) = departments();
        let hq = service.create(input("HQ", None)).await.unwrap();
        let eng = service.create(input("Engineering", Some(hq.id))).await.unwrap();
        let ops = service.create(input("Ops", None)).await.unwrap();

        let moved = service.move_node(ops.id, Some(eng.id)).await.unwrap();
        assert_eq!(moved.parent_id, Some(eng.id));
        assert_eq!(moved.display_order, ops.display_order);

        let detached = service.move_node(eng.id, None).await.unwrap();
        assert_eq!(detached.parent_id, None);
        assert_acyclic(&service).await;
    }

    #[tokio::test]
    async fn test_move_then_delete_scenario() {
        let (service, _) = departments();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();

        assert_ok!(service.move_node(a.id, Some(b.id)).await);
        let result = service.delete(b.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        assert_ok!(service.move_node(a.id, None).await);
        assert_ok!(service.delete(b.id).await);
        assert!(matches!(service.get(b.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_guards() {
        let (service, usage) = departments();
        let parent = service.create(input("Parent", None)).await.unwrap();
        service.create(input("Child", Some(parent.id))).await.unwrap();
        let staffed = service.create(input("Staffed", None)).await.unwrap();

        // Children block deletion even without usages
        assert!(matches!(service.delete(parent.id).await, Err(AppError::Conflict(_))));

        // Usages block deletion even without children
        usage.set("Staffed", 2).await;
        assert!(matches!(service.delete(staffed.id).await, Err(AppError::Conflict(_))));

        // The cached count is never the gate
        let refreshed = service.refresh_usage_count(staffed.id).await.unwrap();
        assert_eq!(refreshed.employee_count, 2);
        usage.set("Staffed", 0).await;
        assert_ok!(service.delete(staffed.id).await);

        assert!(matches!(service.delete(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bulk_delete_is_all_or_nothing() {
        let (service, usage) = departments();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();
        let c = service.create(input("C", None)).await.unwrap();
        usage.set("C", 1).await;

        let result = service.bulk_delete(&[a.id, b.id, c.id]).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(service.list_all().await.unwrap().len(), 3);

        assert_eq!(service.bulk_delete(&[a.id, b.id]).await.unwrap(), 2);
        assert_eq!(service.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_delete_counts_earlier_children_as_deleted() {
        let (service, _) = departments();
        let parent = service.create(input("Parent", None)).await.unwrap();
        let child = service.create(input("Child", Some(parent.id))).await.unwrap();

        // Parent first: child still present
        assert_err!(service.bulk_delete(&[parent.id, child.id]).await);
        assert_eq!(service.list_all().await.unwrap().len(), 2);

        assert_ok!(service.bulk_delete(&[child.id, parent.id]).await);
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_delete_rejects_bad_input() {
        let (service, _) = departments();
        let a = service.create(input("A", None)).await.unwrap();

        assert!(matches!(service.bulk_delete(&[]).await, Err(AppError::Validation(_))));
        assert!(matches!(
            service.bulk_delete(&[a.id, a.id]).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.bulk_delete(&[a.id, Uuid::new_v4()]).await,
            Err(AppError::NotFound(_))
        ));
        assert_ok!(service.get(a.id).await);
    }

    #[tokio::test]
    async fn test_reorder_siblings() {
        let (service, _) = departments();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();
        let c = service.create(input("C", None)).await.unwrap();

        service.reorder(&[b.id, a.id, c.id]).await.unwrap();

        let all = service.list_all().await.unwrap();
        let order: HashMap<Uuid, i32> = all.iter().map(|n| (n.id, n.display_order)).collect();
        assert!(order[&b.id] < order[&a.id]);
        assert!(order[&a.id] < order[&c.id]);

        let roots: Vec<Uuid> = service.list_roots().await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(roots, vec![b.id, a.id, c.id]);
    }

    #[tokio::test]
    async fn test_reorder_partial_list_keeps_others() {
        let (service, _) = departments();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();
        let c = service.create(input("C", None)).await.unwrap();

        service.reorder(&[c.id, b.id]).await.unwrap();
        assert_eq!(service.get(c.id).await.unwrap().display_order, 1);
        assert_eq!(service.get(b.id).await.unwrap().display_order, 2);
        assert_eq!(service.get(a.id).await.unwrap().display_order, a.display_order);
    }

    #[tokio::test]
    async fn test_reorder_rejects_bad_input() {
        let (service, _) = departments();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();

        assert!(matches!(service.reorder(&[]).await, Err(AppError::InvalidOperation(_))));
        assert!(matches!(
            service.reorder(&[a.id, a.id]).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.reorder(&[b.id, Uuid::new_v4(), a.id]).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(service.get(b.id).await.unwrap().display_order, 2);
    }

    /// Store that can fail its locked write, or apply moves committed by
    /// another caller just before the lock is taken
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryTreeStore<department::Model>,
        fail_locked: bool,
        moves_before_lock: std::sync::Mutex<Vec<(Uuid, Option<Uuid>)>>,
    }

    impl ScriptedStore {
        fn failing() -> Self {
            Self {
                fail_locked: true,
                ..Default::default()
            }
        }

        fn queue_move(&self, id: Uuid, parent: Option<Uuid>) {
            self.moves_before_lock.lock().unwrap().push((id, parent));
        }
    }

    #[async_trait]
    impl TreeStore<department::Model> for ScriptedStore {
        async fn get(&self, id: Uuid) -> AppResult<Option<department::Model>> {
            self.inner.get(id).await
        }
        async fn get_by_name(&self, name: &str) -> AppResult<Option<department::Model>> {
            self.inner.get_by_name(name).await
        }
        async fn list_by_parent(&self, parent_id: Option<Uuid>) -> AppResult<Vec<department::Model>> {
            self.inner.list_by_parent(parent_id).await
        }
        async fn list_all(&self) -> AppResult<Vec<department::Model>> {
            self.inner.list_all().await
        }
        async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool> {
            self.inner.exists_by_name(name, excluding).await
        }
        async fn count_by_parent(&self, parent_id: Uuid) -> AppResult<u64> {
            self.inner.count_by_parent(parent_id).await
        }
        async fn save(&self, node: department::Model) -> AppResult<department::Model> {
            self.inner.save(node).await
        }
        async fn save_all(&self, nodes: Vec<department::Model>) -> AppResult<Vec<department::Model>> {
            self.inner.save_all(nodes).await
        }
        async fn delete(&self, id: Uuid) -> AppResult<()> {
            self.inner.delete(id).await
        }
        async fn delete_many(&self, ids: &[Uuid]) -> AppResult<()> {
            self.inner.delete_many(ids).await
        }
        async fn update_locked(
            &self,
            mutate: &(dyn for<'a> Fn(&'a [department::Model]) -> AppResult<Vec<department::Model>>
                  + Send
                  + Sync),
        ) -> AppResult<Vec<department::Model>> {
            if self.fail_locked {
                return Err(AppError::Internal("transaction aborted".into()));
            }

            let moves: Vec<(Uuid, Option<Uuid>)> =
                self.moves_before_lock.lock().unwrap().drain(..).collect();
            for (id, parent) in moves {
                let mut node = self.inner.get(id).await?.unwrap();
                node.parent_id = parent;
                self.inner.save(node).await?;
            }

            self.inner.update_locked(mutate).await
        }
    }

    #[tokio::test]
    async fn test_reorder_failure_leaves_orders_unchanged() {
        let store = Arc::new(ScriptedStore::failing());
        let a = department::Model::build(Uuid::new_v4(), &input("A", None), 1, Utc::now());
        let b = department::Model::build(Uuid::new_v4(), &input("B", None), 2, Utc::now());
        store.save(a.clone()).await.unwrap();
        store.save(b.clone()).await.unwrap();
        let service: Departments = HierarchyService::new(store, Arc::new(MemoryUsage::new()));

        assert!(matches!(service.reorder(&[b.id, a.id]).await, Err(AppError::Internal(_))));
        assert_eq!(service.get(a.id).await.unwrap().display_order, 1);
        assert_eq!(service.get(b.id).await.unwrap().display_order, 2);
    }

    fn scripted() -> (Departments, Arc<ScriptedStore>) {
        let store = Arc::new(ScriptedStore::default());
        let service = HierarchyService::new(store.clone(), Arc::new(MemoryUsage::new()));
        (service, store)
    }

    #[tokio::test]
    async fn test_update_does_not_restore_a_stale_parent() {
        let (service, store) = scripted();
        let p = service.create(input("P", None)).await.unwrap();
        let a = service.create(input("A", Some(p.id))).await.unwrap();

        // Another caller detaches A and then hangs P below it
        store.queue_move(a.id, None);
        store.queue_move(p.id, Some(a.id));

        // The caller still believes A sits under P
        let result = service.update(a.id, input("A renamed", Some(p.id))).await;
        assert!(matches!(result, Err(AppError::InvalidOperation(_))));

        assert_acyclic(&service).await;
        assert_eq!(service.get(p.id).await.unwrap().parent_id, Some(a.id));
        assert_eq!(service.get(a.id).await.unwrap().parent_id, None);
        assert_ok!(service.statistics().await);
    }

    #[tokio::test]
    async fn test_reorder_and_refresh_keep_concurrent_parent() {
        let (service, store) = scripted();
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();

        store.queue_move(a.id, Some(b.id));
        let reordered = service.reorder(&[b.id, a.id]).await.unwrap();
        assert_eq!(reordered[1].parent_id, Some(b.id));
        assert_eq!(service.get(a.id).await.unwrap().parent_id, Some(b.id));
        assert_eq!(service.get(a.id).await.unwrap().display_order, 2);

        store.queue_move(a.id, None);
        let refreshed = service.refresh_usage_count(a.id).await.unwrap();
        assert_eq!(refreshed.parent_id, None);
        assert_eq!(service.get(a.id).await.unwrap().parent_id, None);
        assert_acyclic(&service).await;
    }

    #[tokio::test]
    async fn test_traversal() {
        let (service, _) = departments();
        let hq = service.create(input("HQ", None)).await.unwrap();
        let eng = service.create(input("Engineering", Some(hq.id))).await.unwrap();
        let sales = service.create(input("Sales", Some(hq.id))).await.unwrap();
        let backend = service.create(input("Backend", Some(eng.id))).await.unwrap();

        let below: Vec<Uuid> = service.descendants(hq.id).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(below, vec![eng.id, sales.id, backend.id]);

        let above: Vec<Uuid> = service.ancestors(backend.id).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(above, vec![hq.id, eng.id]);
        assert!(service.ancestors(hq.id).await.unwrap().is_empty());

        assert!(service.is_descendant(hq.id, backend.id).await.unwrap());
        assert!(!service.is_descendant(backend.id, hq.id).await.unwrap());
        assert!(!service.is_descendant(sales.id, backend.id).await.unwrap());
        assert!(matches!(service.descendants(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ancestors_reports_dangling_parent() {
        let store = Arc::new(MemoryTreeStore::<department::Model>::new());
        let service: Departments = HierarchyService::new(store.clone(), Arc::new(MemoryUsage::new()));

        let orphan = department::Model::build(
            Uuid::new_v4(),
            &input("Orphan", Some(Uuid::new_v4())),
            1,
            Utc::now(),
        );
        store.save(orphan.clone()).await.unwrap();

        assert!(matches!(service.ancestors(orphan.id).await, Err(AppError::Internal(_))));
        assert!(matches!(service.statistics().await, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_search_and_listing() {
        let (service, _) = departments();
        let hq = service.create(input("HQ", None)).await.unwrap();
        let mut platform = input("Platform", Some(hq.id));
        platform.description = Some("Shared infrastructure".to_string());
        service.create(platform).await.unwrap();
        service.create(input("Infra Ops", Some(hq.id))).await.unwrap();

        assert_eq!(service.search("INFRA").await.unwrap().len(), 2);
        assert_eq!(service.search("").await.unwrap().len(), 3);
        assert_eq!(service.list_children(hq.id).await.unwrap().len(), 2);
        assert_eq!(service.children_count(hq.id).await.unwrap(), 2);
        assert_eq!(service.get_by_name("hq").await.unwrap().id, hq.id);
        assert!(matches!(service.get_by_name("nope").await, Err(AppError::NotFound(_))));
    }

    fn job(name: &str, parent_id: Option<Uuid>, level: PositionLevel, active: bool) -> PositionInput {
        PositionInput {
            name: name.to_string(),
            parent_id,
            level: Some(level),
            is_active: Some(active),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_position_statistics_and_leaves() {
        let service: HierarchyService<position::Model> = HierarchyService::new(
            Arc::new(MemoryTreeStore::<position::Model>::new()),
            Arc::new(MemoryUsage::new()),
        );
        let ceo = service.create(job("CEO", None, PositionLevel::Executive, true)).await.unwrap();
        let cto = service
            .create(job("CTO", Some(ceo.id), PositionLevel::Director, true))
            .await
            .unwrap();
        let dev = service
            .create(job("Developer", Some(cto.id), PositionLevel::Senior, true))
            .await
            .unwrap();
        let retired = service
            .create(job("Retired", Some(cto.id), PositionLevel::Lead, false))
            .await
            .unwrap();
        let intern = service
            .create(job("Intern", Some(retired.id), PositionLevel::Intern, true))
            .await
            .unwrap();
        let advisor = service.create(job("Advisor", None, PositionLevel::Senior, true)).await.unwrap();

        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.active, 5);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.root_count, 2);
        assert_eq!(stats.child_count, 4);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.by_category.get("SENIOR"), Some(&2));
        assert_eq!(stats.by_category.get("LEAD"), None);

        // The inactive branch is skipped under a parent
        let under: Vec<Uuid> = service.leaves(Some(ceo.id)).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(under, vec![dev.id]);

        let mut all: Vec<Uuid> = service.leaves(None).await.unwrap().iter().map(|n| n.id).collect();
        all.sort();
        let mut expected = vec![dev.id, intern.id, advisor.id];
        expected.sort();
        assert_eq!(all, expected);

        let active = service.list_active().await.unwrap();
        assert!(active.iter().all(|p| p.is_active));
        assert_eq!(active.len(), 5);
    }

    #[tokio::test]
    async fn test_statistics_on_empty_and_flat_trees() {
        let (service, _) = departments();
        let stats = service.statistics().await.unwrap();
        assert_eq!(stats, HierarchyStats::default());

        service.create(input("Solo", None)).await.unwrap();
        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.max_depth, 0);
        assert!(stats.by_category.is_empty());
    }

    #[tokio::test]
    async fn test_no_cycles_after_mixed_operations() {
        let (service, _) = departments();
        let mut ids = Vec::new();
        for i in 0..6 {
            let parent = ids.last().copied();
            ids.push(service.create(input(&format!("N{}", i), parent)).await.unwrap().id);
        }

        // Try every move; rejected ones must leave the tree intact
        for &from in &ids {
            for &to in &ids {
                match service.move_node(from, Some(to)).await {
                    Ok(moved) => assert_eq!(moved.parent_id, Some(to)),
                    Err(AppError::InvalidOperation(_)) => {}
                    Err(other) => panic!("unexpected error moving {} under {}: {}", from, to, other),
                }
                assert_acyclic(&service).await;
            }
            assert_ok!(service.move_node(from, None).await);
        }
        assert_acyclic(&service).await;
    }
}
