//! Employee entity
//!
//! Only the columns the hierarchy needs: which department and position an
//! employee belongs to. Table: employees

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "String(Some(100))")]
    pub name: String,

    /// Department name (legacy reference by name)
    #[sea_orm(column_type = "String(Some(100))", nullable)]
    pub department: Option<String>,

    #[sea_orm(nullable)]
    pub department_id: Option<Uuid>,

    /// Position name
    #[sea_orm(column_type = "String(Some(100))", nullable)]
    pub position: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
