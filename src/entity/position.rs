//! Position entity
//!
//! Table: positions

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::hierarchy::{NodeInput, TreeNode};
use crate::ordering::Sequenced;

/// Seniority level of a position
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionLevel {
    #[sea_orm(string_value = "INTERN")]
    Intern,
    #[default]
    #[sea_orm(string_value = "JUNIOR")]
    Junior,
    #[sea_orm(string_value = "SENIOR")]
    Senior,
    #[sea_orm(string_value = "LEAD")]
    Lead,
    #[sea_orm(string_value = "MANAGER")]
    Manager,
    #[sea_orm(string_value = "DIRECTOR")]
    Director,
    #[sea_orm(string_value = "EXECUTIVE")]
    Executive,
}

impl PositionLevel {
    /// Stored and serialized code
    pub fn code(&self) -> &'static str {
        match self {
            PositionLevel::Intern => "INTERN",
            PositionLevel::Junior => "JUNIOR",
            PositionLevel::Senior => "SENIOR",
            PositionLevel::Lead => "LEAD",
            PositionLevel::Manager => "MANAGER",
            PositionLevel::Director => "DIRECTOR",
            PositionLevel::Executive => "EXECUTIVE",
        }
    }
}

/// Listing group a position belongs to
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum PositionFilter {
    /// Organisational unit
    #[sea_orm(string_value = "CO_QUAN_DON_VI")]
    #[serde(rename = "CO_QUAN_DON_VI")]
    OrgUnit,
    /// Job title
    #[sea_orm(string_value = "CHUC_VU")]
    #[serde(rename = "CHUC_VU")]
    JobTitle,
    #[default]
    #[sea_orm(string_value = "N_A")]
    #[serde(rename = "N_A")]
    Unassigned,
}

impl PositionFilter {
    /// Parse a stored code, ignoring case
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "CO_QUAN_DON_VI" => Some(PositionFilter::OrgUnit),
            "CHUC_VU" => Some(PositionFilter::JobTitle),
            "N_A" => Some(PositionFilter::Unassigned),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "positions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Position name, unique across all positions
    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub name: String,

    #[sea_orm(column_type = "String(Some(500))", nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub parent_id: Option<Uuid>,

    pub level: PositionLevel,

    pub filter_by: PositionFilter,

    /// Salary range in whole currency units
    #[sea_orm(nullable)]
    pub min_salary: Option<i64>,

    #[sea_orm(nullable)]
    pub max_salary: Option<i64>,

    /// Inactive positions stay in the tree but drop out of active listings
    pub is_active: bool,

    pub display_order: i32,

    /// Cached holder count. Views report the live count.
    #[serde(default, skip_serializing)]
    pub employee_count: i32,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Create/update request for a position
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub level: Option<PositionLevel>,
    #[serde(default)]
    pub filter_by: Option<PositionFilter>,
    #[serde(default)]
    pub min_salary: Option<i64>,
    #[serde(default)]
    pub max_salary: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl NodeInput for PositionInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn display_order(&self) -> Option<i32> {
        self.display_order
    }

    fn validate(&self) -> AppResult<()> {
        if self.min_salary.map_or(false, |v| v < 0) || self.max_salary.map_or(false, |v| v < 0) {
            return Err(AppError::Validation("salary must not be negative".to_string()));
        }
        if let (Some(min), Some(max)) = (self.min_salary, self.max_salary) {
            if min > max {
                return Err(AppError::Validation(format!(
                    "minimum salary {} exceeds maximum {}",
                    min, max
                )));
            }
        }
        Ok(())
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
    type Input = PositionInput;

    const KIND: &'static str = "Position";

    fn build(id: Uuid, input: &PositionInput, display_order: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            parent_id: input.parent_id,
            level: input.level.unwrap_or_default(),
            filter_by: input.filter_by.unwrap_or_default(),
            min_salary: input.min_salary,
            max_salary: input.max_salary,
            is_active: input.is_active.unwrap_or(true),
            display_order,
            employee_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, input: &PositionInput, now: DateTime<Utc>) {
        self.name = input.name.clone();
        self.description = input.description.clone();
        self.parent_id = input.parent_id;
        self.level = input.level.unwrap_or_default();
        self.filter_by = input.filter_by.unwrap_or_default();
        self.min_salary = input.min_salary;
        self.max_salary = input.max_salary;
        self.is_active = input.is_active.unwrap_or(true);
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

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn category(&self) -> Option<String> {
        Some(self.level.code().to_string())
    }
}

impl From<&Model> for ActiveModel {
    fn from(m: &Model) -> Self {
        Self {
            id: Set(m.id),
            name: Set(m.name.clone()),
            description: Set(m.description.clone()),
            parent_id: Set(m.parent_id),
            level: Set(m.level),
            filter_by: Set(m.filter_by),
            min_salary: Set(m.min_salary),
            max_salary: Set(m.max_salary),
            is_active: Set(m.is_active),
            display_order: Set(m.display_order),
            employee_count: Set(m.employee_count),
            created_at: Set(m.created_at),
            updated_at: Set(m.updated_at),
        }
    }
}
