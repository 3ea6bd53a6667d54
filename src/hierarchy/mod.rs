//! Self-referencing hierarchy management
//!
//! Departments and positions are both trees stored as flat rows with a
//! nullable `parent_id`. Everything here is written once against [`TreeNode`]
//! and instantiated per kind.
//!
//! - `store`: persistence contract ([`TreeStore`]) plus the in-memory store
//! - `service`: the only place tree invariants are enforced
//! - `mapper`: read-side views with derived fields
//! - `usage`: live usage counts (employees pointing at a node)
//! - `kinds`: reads and writes that only make sense for one kind

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::ordering::Sequenced;

pub mod kinds;
pub mod mapper;
pub mod memory;
pub mod service;
pub mod store;
pub mod usage;

pub use mapper::{NodeMapper, NodeTree, NodeView};
pub use memory::MemoryTreeStore;
pub use service::{HierarchyService, HierarchyStats};
pub use store::TreeStore;
pub use usage::{EmployeeLookup, EmployeeUsage, MemoryUsage, UsageCounter};

/// Input accepted by create and update
pub trait NodeInput: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn parent_id(&self) -> Option<Uuid>;
    fn display_order(&self) -> Option<i32>;

    /// Kind-specific checks beyond the name
    fn validate(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Capabilities a hierarchy node must expose
///
/// `Sequenced::sequence` is the node's display order among its siblings.
pub trait TreeNode: Sequenced + Clone + Send + Sync + 'static {
    type Input: NodeInput;

    /// Human readable kind used in messages and logs
    const KIND: &'static str;

    /// Build a fresh node from validated input
    fn build(id: Uuid, input: &Self::Input, display_order: i32, now: DateTime<Utc>) -> Self;

    /// Overwrite every input-controlled field.
    ///
    /// A missing display order keeps the current one.
    fn apply(&mut self, input: &Self::Input, now: DateTime<Utc>);

    fn name(&self) -> &str;
    fn description(&self) -> Option<&str>;
    fn parent_id(&self) -> Option<Uuid>;
    fn set_parent_id(&mut self, parent_id: Option<Uuid>, now: DateTime<Utc>);
    fn created_at(&self) -> DateTime<Utc>;

    /// Store the cached usage count
    fn set_usage_count(&mut self, count: i32, now: DateTime<Utc>);

    fn is_active(&self) -> bool {
        true
    }

    /// Grouping key for statistics
    fn category(&self) -> Option<String> {
        None
    }
}

/// Sibling ordering: display order, then creation time
pub fn sort_siblings<N: TreeNode>(nodes: &mut [N]) {
    nodes.sort_by(|a, b| {
        a.sequence()
            .cmp(&b.sequence())
            .then_with(|| a.created_at().cmp(&b.created_at()))
    });
}

/// Names are unique per kind regardless of case
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
