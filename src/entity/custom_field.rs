//! Custom field entity
//!
//! Flat, ordered list of extra employee form fields. Table: custom_fields

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::ordering::Sequenced;

/// Input widget type of a custom field
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "number")]
    Number,
    #[sea_orm(string_value = "date")]
    Date,
    #[sea_orm(string_value = "select")]
    Select,
    #[sea_orm(string_value = "checkbox")]
    Checkbox,
    #[sea_orm(string_value = "textarea")]
    Textarea,
}

impl FieldType {
    /// Stored and serialized code
    pub fn code(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Textarea => "textarea",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "custom_fields")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub name: String,

    pub field_type: FieldType,

    #[sea_orm(column_type = "String(Some(100))")]
    pub category: String,

    pub required: bool,

    /// Position in the form
    pub field_order: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub is_active: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Create/update request for a custom field
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldInput {
    pub name: String,
    #[serde(default)]
    pub field_type: FieldType,
    pub category: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub field_order: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Model {
    pub fn build(id: Uuid, input: &CustomFieldInput, field_order: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.clone(),
            field_type: input.field_type,
            category: input.category.clone(),
            required: input.required,
            field_order,
            description: input.description.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, input: &CustomFieldInput, now: DateTime<Utc>) {
        self.name = input.name.clone();
        self.field_type = input.field_type;
        self.category = input.category.clone();
        self.required = input.required;
        if let Some(order) = input.field_order {
            self.field_order = order;
        }
        self.description = input.description.clone();
        if let Some(active) = input.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
    }
}

impl Sequenced for Model {
    fn id(&self) -> Uuid {
        self.id
    }

    fn sequence(&self) -> i32 {
        self.field_order
    }

    fn set_sequence(&mut self, order: i32, now: DateTime<Utc>) {
        self.field_order = order;
        self.updated_at = now;
    }
}

impl From<&Model> for ActiveModel {
    fn from(m: &Model) -> Self {
        Self {
            id: Set(m.id),
            name: Set(m.name.clone()),
            field_type: Set(m.field_type),
            category: Set(m.category.clone()),
            required: Set(m.required),
            field_order: Set(m.field_order),
            description: Set(m.description.clone()),
            is_active: Set(m.is_active),
            created_at: Set(m.created_at),
            updated_at: Set(m.updated_at),
        }
    }
}
