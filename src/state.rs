use axum::extract::FromRef;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::custom_field::{CustomFieldService, MemoryFieldStore};
use crate::entity::{department, position};
use crate::hierarchy::{
    EmployeeLookup, EmployeeUsage, HierarchyService, MemoryTreeStore, MemoryUsage, NodeMapper,
    TreeNode,
};
use crate::store::{DepartmentStore, PositionStore, SeaFieldStore};

/// Service and read-side mapper for one tree kind
pub struct Hierarchy<N: TreeNode> {
    pub service: Arc<HierarchyService<N>>,
    pub mapper: NodeMapper<N>,
}

impl<N: TreeNode> Clone for Hierarchy<N> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

impl<N: TreeNode> Hierarchy<N> {
    pub fn new(service: HierarchyService<N>) -> Self {
        let service = Arc::new(service);
        Self {
            mapper: NodeMapper::new(service.clone()),
            service,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    pub departments: Hierarchy<department::Model>,
    pub positions: Hierarchy<position::Model>,
    pub custom_fields: CustomFieldService,
    /// Employee existence checks for manager assignment
    pub employees: Arc<dyn EmployeeLookup>,
}

impl AppState {
    /// State backed by the relational database
    pub fn with_database(db: DatabaseConnection, config: Config) -> Self {
        let usage = Arc::new(EmployeeUsage::new(db.clone()));

        Self {
            config: Arc::new(config),
            departments: Hierarchy::new(HierarchyService::new(
                Arc::new(DepartmentStore::new(db.clone())),
                usage.clone(),
            )),
            positions: Hierarchy::new(HierarchyService::new(
                Arc::new(PositionStore::new(db.clone())),
                usage.clone(),
            )),
            custom_fields: CustomFieldService::new(Arc::new(SeaFieldStore::new(db))),
            employees: usage,
        }
    }

    /// Process-local state; nothing survives a restart and usage counts come
    /// from `usage`
    pub fn in_memory(config: Config, usage: Arc<MemoryUsage>) -> Self {
        Self {
            config: Arc::new(config),
            departments: Hierarchy::new(HierarchyService::new(
                Arc::new(MemoryTreeStore::<department::Model>::new()),
                usage.clone(),
            )),
            positions: Hierarchy::new(HierarchyService::new(
                Arc::new(MemoryTreeStore::<position::Model>::new()),
                usage.clone(),
            )),
            custom_fields: CustomFieldService::new(Arc::new(MemoryFieldStore::new())),
            employees: usage,
        }
    }
}

impl FromRef<AppState> for Hierarchy<department::Model> {
    fn from_ref(state: &AppState) -> Self {
        state.departments.clone()
    }
}

impl FromRef<AppState> for Hierarchy<position::Model> {
    fn from_ref(state: &AppState) -> Self {
        state.positions.clone()
    }
}

impl FromRef<AppState> for CustomFieldService {
    fn from_ref(state: &AppState) -> Self {
        state.custom_fields.clone()
    }
}
