//! Live usage counts
//!
//! A node is "in use" while employees point at it. These counts gate deletion
//! and feed views; the `employee_count` column on the node is only a cache.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::{department, employee, position};
use crate::error::AppResult;

use super::TreeNode;

#[async_trait]
pub trait UsageCounter<N: TreeNode>: Send + Sync {
    /// Number of live records referencing `node`
    async fn count_usages(&self, node: &N) -> AppResult<u64>;
}

/// Employee existence checks for manager assignment
#[async_trait]
pub trait EmployeeLookup: Send + Sync {
    async fn employee_exists(&self, id: Uuid) -> AppResult<bool>;
}

/// Counts usages in the employees table
#[derive(Clone)]
pub struct EmployeeUsage {
    db: DatabaseConnection,
}

impl EmployeeUsage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn name_matches(column: employee::Column, name: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).eq(name.to_lowercase())
}

#[async_trait]
impl UsageCounter<department::Model> for EmployeeUsage {
    async fn count_usages(&self, node: &department::Model) -> AppResult<u64> {
        // Older rows only carry the department name
        let count = employee::Entity::find()
            .filter(
                Condition::any()
                    .add(employee::Column::DepartmentId.eq(node.id))
                    .add(name_matches(employee::Column::Department, &node.name)),
            )
            .count(&self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl UsageCounter<position::Model> for EmployeeUsage {
    async fn count_usages(&self, node: &position::Model) -> AppResult<u64> {
        let count = employee::Entity::find()
            .filter(name_matches(employee::Column::Position, &node.name))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl EmployeeLookup for EmployeeUsage {
    async fn employee_exists(&self, id: Uuid) -> AppResult<bool> {
        let count = employee::Entity::find_by_id(id).count(&self.db).await?;
        Ok(count > 0)
    }
}

/// Fixed usage counts keyed by node name, for in-memory deployments and tests
#[derive(Default)]
pub struct MemoryUsage {
    counts: RwLock<HashMap<String, u64>>,
    employees: RwLock<HashSet<Uuid>>,
}

impl MemoryUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, name: &str, count: u64) {
        let mut counts = self.counts.write().await;
        if count == 0 {
            counts.remove(&name.to_lowercase());
        } else {
            counts.insert(name.to_lowercase(), count);
        }
    }

    /// Register an employee id for manager lookups
    pub async fn add_employee(&self, id: Uuid) {
        self.employees.write().await.insert(id);
    }
}

#[async_trait]
impl EmployeeLookup for MemoryUsage {
    async fn employee_exists(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.employees.read().await.contains(&id))
    }
}

#[async_trait]
impl<N: TreeNode> UsageCounter<N> for MemoryUsage {
    async fn count_usages(&self, node: &N) -> AppResult<u64> {
        let counts = self.counts.read().await;
        Ok(counts.get(&node.name().to_lowercase()).copied().unwrap_or(0))
    }
}
