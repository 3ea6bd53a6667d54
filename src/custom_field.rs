//! Custom field management
//!
//! A flat, ordered list of extra employee form fields. Ordering uses the same
//! resequencing as hierarchy siblings.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::custom_field::{self, CustomFieldInput, FieldType};
use crate::error::{AppError, AppResult, OptionExt};
use crate::hierarchy::same_name;
use crate::ordering::{next_sequence, resequence, validate_sequence};

type Field = custom_field::Model;

#[async_trait]
pub trait FieldStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Field>>;

    /// Ordered by field order
    async fn list_all(&self) -> AppResult<Vec<Field>>;

    /// Case-insensitive, optionally ignoring one field
    async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool>;

    async fn save(&self, field: Field) -> AppResult<Field>;

    /// Replace all fields in one transaction
    async fn save_all(&self, fields: Vec<Field>) -> AppResult<Vec<Field>>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

fn sort_fields(fields: &mut [Field]) {
    fields.sort_by(|a, b| {
        a.field_order
            .cmp(&b.field_order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// Process-local field store
#[derive(Default)]
pub struct MemoryFieldStore {
    fields: RwLock<HashMap<Uuid, Field>>,
}

impl MemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldStore for MemoryFieldStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Field>> {
        Ok(self.fields.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Field>> {
        let mut all: Vec<Field> = self.fields.read().await.values().cloned().collect();
        sort_fields(&mut all);
        Ok(all)
    }

    async fn exists_by_name(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        let fields = self.fields.read().await;
        Ok(fields
            .values()
            .any(|f| Some(f.id) != excluding && same_name(&f.name, name)))
    }

    async fn save(&self, field: Field) -> AppResult<Field> {
        let mut fields = self.fields.write().await;
        let taken = fields
            .values()
            .any(|f| f.id != field.id && same_name(&f.name, &field.name));
        if taken {
            return Err(AppError::DuplicateName(format!(
                "Custom field '{}' already exists",
                field.name
            )));
        }
        fields.insert(field.id, field.clone());
        Ok(field)
    }

    async fn save_all(&self, batch: Vec<Field>) -> AppResult<Vec<Field>> {
        let mut fields = self.fields.write().await;
        for field in &batch {
            fields.insert(field.id, field.clone());
        }
        Ok(batch)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.fields.write().await.remove(&id);
        Ok(())
    }
}

/// Field counts per category and per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStats {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
}

#[derive(Clone)]
pub struct CustomFieldService {
    store: Arc<dyn FieldStore>,
}

fn validate(input: &CustomFieldInput) -> AppResult<()> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be blank".to_string()));
    }
    if input.category.trim().is_empty() {
        return Err(AppError::Validation("category must not be blank".to_string()));
    }
    Ok(())
}

impl CustomFieldService {
    pub fn new(store: Arc<dyn FieldStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Field>> {
        self.store.list_all().await
    }

    pub async fn list_active(&self) -> AppResult<Vec<Field>> {
        let all = self.store.list_all().await?;
        Ok(all.into_iter().filter(|f| f.is_active).collect())
    }

    /// All fields, or only active ones, in field order
    async fn listing(&self, active_only: bool) -> AppResult<Vec<Field>> {
        let all = self.store.list_all().await?;
        Ok(all
            .into_iter()
            .filter(|f| !active_only || f.is_active)
            .collect())
    }

    pub async fn list_by_category(&self, category: &str, active_only: bool) -> AppResult<Vec<Field>> {
        let fields = self.listing(active_only).await?;
        Ok(fields.into_iter().filter(|f| f.category == category).collect())
    }

    pub async fn list_by_type(&self, field_type: FieldType, active_only: bool) -> AppResult<Vec<Field>> {
        let fields = self.listing(active_only).await?;
        Ok(fields.into_iter().filter(|f| f.field_type == field_type).collect())
    }

    pub async fn list_by_required(&self, required: bool, active_only: bool) -> AppResult<Vec<Field>> {
        let fields = self.listing(active_only).await?;
        Ok(fields.into_iter().filter(|f| f.required == required).collect())
    }

    pub async fn statistics(&self, active_only: bool) -> AppResult<FieldStats> {
        let fields = self.listing(active_only).await?;
        let mut stats = FieldStats {
            total: fields.len() as u64,
            ..Default::default()
        };
        for field in &fields {
            *stats.by_category.entry(field.category.clone()).or_insert(0) += 1;
            *stats.by_type.entry(field.field_type.code().to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    /// Case-insensitive, optionally ignoring one field
    pub async fn name_exists(&self, name: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        self.store.exists_by_name(name, excluding).await
    }

    /// Case-insensitive match on name or category
    pub async fn search(&self, term: &str) -> AppResult<Vec<Field>> {
        let needle = term.trim().to_lowercase();
        let all = self.store.list_all().await?;
        Ok(all
            .into_iter()
            .filter(|f| {
                f.name.to_lowercase().contains(&needle)
                    || f.category.to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Field> {
        self.store
            .get(id)
            .await?
            .ok_or_not_found(format!("Custom field not found with id: {}", id))
    }

    /// Distinct categories, sorted
    pub async fn categories(&self, active_only: bool) -> AppResult<Vec<String>> {
        let fields = self.listing(active_only).await?;
        let set: BTreeSet<String> = fields.into_iter().map(|f| f.category).collect();
        Ok(set.into_iter().collect())
    }

    pub async fn create(&self, input: CustomFieldInput) -> AppResult<Field> {
        validate(&input)?;
        if self.store.exists_by_name(&input.name, None).await? {
            return Err(AppError::DuplicateName(format!(
                "Custom field '{}' already exists",
                input.name
            )));
        }

        let order = match input.field_order {
            Some(order) => order,
            None => next_sequence(&self.store.list_all().await?),
        };

        let field = Field::build(Uuid::new_v4(), &input, order, Utc::now());
        let saved = self.store.save(field).await?;
        tracing::info!("Created custom field {} '{}'", saved.id, saved.name);
        Ok(saved)
    }

    pub async fn update(&self, id: Uuid, input: CustomFieldInput) -> AppResult<Field> {
        validate(&input)?;
        let mut field = self.get(id).await?;
        if self.store.exists_by_name(&input.name, Some(id)).await? {
            return Err(AppError::DuplicateName(format!(
                "Custom field '{}' already exists",
                input.name
            )));
        }

        field.apply(&input, Utc::now());
        let saved = self.store.save(field).await?;
        tracing::info!("Updated custom field {} '{}'", saved.id, saved.name);
        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let field = self.get(id).await?;
        self.store.delete(id).await?;
        tracing::info!("Deleted custom field {} '{}'", id, field.name);
        Ok(())
    }

    pub async fn toggle_active(&self, id: Uuid) -> AppResult<Field> {
        let mut field = self.get(id).await?;
        field.is_active = !field.is_active;
        field.updated_at = Utc::now();
        self.store.save(field).await
    }

    pub async fn reorder(&self, ids: &[Uuid]) -> AppResult<Vec<Field>> {
        validate_sequence(ids)?;

        let mut fields = Vec::with_capacity(ids.len());
        for &id in ids {
            fields.push(self.get(id).await?);
        }

        let saved = self.store.save_all(resequence(ids, fields)?).await?;
        tracing::info!("Reordered {} custom fields", saved.len());
        Ok(saved)
    }
}
