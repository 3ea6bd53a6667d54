//! Read-side views
//!
//! Adds the derived fields callers need (parent name, children count, live
//! employee count) on top of a stored node. Never writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::{HierarchyService, TreeNode};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView<N> {
    #[serde(flatten)]
    pub node: N,
    pub parent_name: Option<String>,
    pub children_count: u64,
    /// Live count, not the cached column
    pub employee_count: u64,
}

/// A view with its children, ordered by display order
#[derive(Debug, Clone, Serialize)]
pub struct NodeTree<N> {
    #[serde(flatten)]
    pub view: NodeView<N>,
    pub children: Vec<NodeTree<N>>,
}

pub struct NodeMapper<N: TreeNode> {
    service: Arc<HierarchyService<N>>,
}

impl<N: TreeNode> Clone for NodeMapper<N> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<N: TreeNode> NodeMapper<N> {
    pub fn new(service: Arc<HierarchyService<N>>) -> Self {
        Self { service }
    }

    pub async fn view(&self, node: N) -> AppResult<NodeView<N>> {
        let parent_name = match node.parent_id() {
            None => None,
            Some(parent_id) => match self.service.get(parent_id).await {
                Ok(parent) => Some(parent.name().to_string()),
                Err(AppError::NotFound(_)) => {
                    return Err(AppError::Internal(format!(
                        "{} {} references missing parent {}",
                        N::KIND,
                        node.id(),
                        parent_id
                    )))
                }
                Err(e) => return Err(e),
            },
        };
        let children_count = self.service.children_count(node.id()).await?;
        let employee_count = self.service.usage_count(&node).await?;

        Ok(NodeView {
            node,
            parent_name,
            children_count,
            employee_count,
        })
    }

    pub async fn views(&self, nodes: Vec<N>) -> AppResult<Vec<NodeView<N>>> {
        let mut views = Vec::with_capacity(nodes.len());
        for node in nodes {
            views.push(self.view(node).await?);
        }
        Ok(views)
    }

    /// The whole forest from one snapshot.
    ///
    /// A dangling parent or a node no root reaches is an integrity fault.
    pub async fn tree(&self) -> AppResult<Vec<NodeTree<N>>> {
        let all = self.service.list_all().await?;
        let total = all.len();
        let names: HashMap<Uuid, String> =
            all.iter().map(|n| (n.id(), n.name().to_string())).collect();

        let mut children: HashMap<Option<Uuid>, Vec<Uuid>> = HashMap::new();
        for node in &all {
            children.entry(node.parent_id()).or_default().push(node.id());
        }

        let mut views: HashMap<Uuid, NodeView<N>> = HashMap::with_capacity(all.len());
        for node in all {
            let parent_name = match node.parent_id() {
                None => None,
                Some(parent_id) => Some(names.get(&parent_id).cloned().ok_or_else(|| {
                    AppError::Internal(format!(
                        "{} {} references missing parent {}",
                        N::KIND,
                        node.id(),
                        parent_id
                    ))
                })?),
            };
            let children_count = children.get(&Some(node.id())).map_or(0, |c| c.len()) as u64;
            let employee_count = self.service.usage_count(&node).await?;
            views.insert(
                node.id(),
                NodeView {
                    node,
                    parent_name,
                    children_count,
                    employee_count,
                },
            );
        }

        let mut visited = HashSet::new();
        let roots = children.get(&None).cloned().unwrap_or_default();
        let forest: Vec<NodeTree<N>> = roots
            .into_iter()
            .filter_map(|id| assemble(id, &children, &mut views, &mut visited))
            .collect();

        if visited.len() != total {
            return Err(AppError::Internal(format!(
                "{} {} nodes are not reachable from any root",
                total - visited.len(),
                N::KIND
            )));
        }
        Ok(forest)
    }
}

// `list_all` is already in sibling order, so children keep it
fn assemble<N>(
    id: Uuid,
    children: &HashMap<Option<Uuid>, Vec<Uuid>>,
    views: &mut HashMap<Uuid, NodeView<N>>,
    visited: &mut HashSet<Uuid>,
) -> Option<NodeTree<N>> {
    if !visited.insert(id) {
        return None;
    }
    let view = views.remove(&id)?;
    let kids = children
        .get(&Some(id))
        .map(|ids| {
            ids.iter()
                .filter_map(|child| assemble(*child, children, views, visited))
                .collect()
        })
        .unwrap_or_default();

    Some(NodeTree {
        view,
        children: kids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::department::{self, DepartmentInput};
    use crate::hierarchy::{MemoryTreeStore, MemoryUsage, TreeStore};
    use chrono::Utc;

    async fn setup() -> (NodeMapper<department::Model>, Arc<HierarchyService<department::Model>>, Arc<MemoryUsage>) {
        let usage = Arc::new(MemoryUsage::new());
        let service = Arc::new(HierarchyService::new(
            Arc::new(MemoryTreeStore::<department::Model>::new()),
            usage.clone(),
        ));
        (NodeMapper::new(service.clone()), service, usage)
    }

    fn input(name: &str, parent_id: Option<Uuid>) -> DepartmentInput {
        DepartmentInput {
            name: name.to_string(),
            parent_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_view_has_derived_fields() {
        let (mapper, service, usage) = setup().await;
        let hq = service.create(input("HQ", None)).await.unwrap();
        let eng = service.create(input("Engineering", Some(hq.id))).await.unwrap();
        service.create(input("Backend", Some(eng.id))).await.unwrap();
        usage.set("Engineering", 4).await;

        let root = mapper.view(hq).await.unwrap();
        assert_eq!(root.parent_name, None);
        assert_eq!(root.children_count, 1);
        assert_eq!(root.employee_count, 0);

        let view = mapper.view(eng).await.unwrap();
        assert_eq!(view.parent_name.as_deref(), Some("HQ"));
        assert_eq!(view.children_count, 1);
        assert_eq!(view.employee_count, 4);
        // The cached column is untouched
        assert_eq!(view.node.employee_count, 0);
    }

    #[tokio::test]
    async fn test_view_serializes_camel_case() {
        let (mapper, service, usage) = setup().await;
        let hq = service.create(input("HQ", None)).await.unwrap();
        usage.set("HQ", 2).await;

        let json = serde_json::to_value(mapper.view(hq).await.unwrap()).unwrap();
        assert_eq!(json["name"], "HQ");
        assert_eq!(json["parentName"], serde_json::Value::Null);
        assert_eq!(json["childrenCount"], 0);
        assert_eq!(json["employeeCount"], 2);
        assert!(json.get("displayOrder").is_some());
    }

    #[tokio::test]
    async fn test_tree_nests_in_display_order() {
        let (mapper, service, _) = setup().await;
        let hq = service.create(input("HQ", None)).await.unwrap();
        let b = service.create(input("B", Some(hq.id))).await.unwrap();
        let a = service.create(input("A", Some(hq.id))).await.unwrap();
        service.create(input("Lab", None)).await.unwrap();
        service.reorder(&[a.id, b.id]).await.unwrap();

        let tree = mapper.tree().await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].view.node.name, "HQ");
        assert_eq!(tree[0].view.children_count, 2);

        let names: Vec<&str> = tree[0]
            .children
            .iter()
            .map(|c| c.view.node.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(tree[0].children[0].view.parent_name.as_deref(), Some("HQ"));
        assert!(tree[1].children.is_empty());
    }

    async fn with_rows(rows: Vec<department::Model>) -> NodeMapper<department::Model> {
        let store = Arc::new(MemoryTreeStore::<department::Model>::new());
        for row in rows {
            store.save(row).await.unwrap();
        }
        let service = Arc::new(HierarchyService::new(store, Arc::new(MemoryUsage::new())));
        NodeMapper::new(service)
    }

    fn row(name: &str, parent_id: Option<Uuid>) -> department::Model {
        department::Model::build(Uuid::new_v4(), &input(name, parent_id), 1, Utc::now())
    }

    #[tokio::test]
    async fn test_tree_reports_dangling_parent() {
        let mapper = with_rows(vec![row("HQ", None), row("Orphan", Some(Uuid::new_v4()))]).await;
        assert!(matches!(mapper.tree().await, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_tree_reports_unreachable_cycle() {
        let mut a = row("A", None);
        let mut b = row("B", None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);

        let mapper = with_rows(vec![row("HQ", None), a, b]).await;
        assert!(matches!(mapper.tree().await, Err(AppError::Internal(_))));
    }
}
