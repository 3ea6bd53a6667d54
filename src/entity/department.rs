//! Department entity
//!
//! Table: departments

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::hierarchy::{NodeInput, TreeNode};
use crate::ordering::Sequenced;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "departments")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Department name, unique across all departments
    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub name: String,

    #[sea_orm(column_type = "String(Some(500))", nullable)]
    pub description: Option<String>,

    /// Parent department (None for a root)
    #[sea_orm(nullable)]
    pub parent_id: Option<Uuid>,

    /// Managing employee
    #[sea_orm(nullable)]
    pub manager_id: Option<Uuid>,

    /// Position among siblings
    pub display_order: i32,

    /// Cached employee count, refreshed on demand. Views report the live count.
    #[serde(default, skip_serializing)]
    pub employee_count: i32,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// Parent/child links are resolved by explicit queries on parent_id

impl ActiveModelBehavior for ActiveModel {}

/// Create/update request for a department
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl NodeInput for DepartmentInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn display_order(&self) -> Option<i32> {
        self.display_order
    }
}

impl Sequenced for Model {
    fn id(&self) -> Uuid {
        self.id
    }

    fn sequence(&self) -> i32 {
        self.display_order
    }

    fn set_sequence(&mut self, order: i32, now: DateTime<Utc>) {
        self.display_order = order;
        self.updated_at = now;
    }
}

impl TreeNode for Model {
    type Input = DepartmentInput;

    const KIND: &'static str = "Department";

    fn build(id: Uuid, input: &DepartmentInput, display_order: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            parent_id: input.parent_id,
            manager_id: input.manager_id,
            display_order,
            employee_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, input: &DepartmentInput, now: DateTime<Utc>) {
        self.name = input.name.clone();
        self.description = input.description.clone();
        self.parent_id = input.parent_id;
        self.manager_id = input.manager_id;
        if let Some(order) = input.display_order {
            self.display_order = order;
        }
        self.updated_at = now;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn set_parent_id(&mut self, parent_id: Option<Uuid>, now: DateTime<Utc>) {
        self.parent_id = parent_id;
        self.updated_at = now;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn set_usage_count(&mut self, count: i32, now: DateTime<Utc>) {
        self.employee_count = count;
        self.updated_at = now;
    }
}

impl From<&Model> for ActiveModel {
    fn from(m: &Model) -> Self {
        Self {
            id: Set(m.id),
            name: Set(m.name.clone()),
            description: Set(m.description.clone()),
            parent_id: Set(m.parent_id),
            manager_id: Set(m.manager_id),
            display_order: Set(m.display_order),
            employee_count: Set(m.employee_count),
            created_at: Set(m.created_at),
            updated_at: Set(m.updated_at),
        }
    }
}
