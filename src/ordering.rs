//! Ordered collection helpers
//!
//! Shared by hierarchy sibling reordering and custom field reordering.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Anything positioned by an integer order value
pub trait Sequenced {
    fn id(&self) -> Uuid;
    fn sequence(&self) -> i32;
    fn set_sequence(&mut self, order: i32, now: DateTime<Utc>);
}

/// Reject an empty list or one naming the same id twice
pub fn validate_sequence(ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Err(AppError::InvalidOperation("reorder list is empty".to_string()));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(AppError::InvalidOperation(format!(
                "id {} appears more than once in reorder list",
                id
            )));
        }
    }

    Ok(())
}

/// Assign `index + 1` to each item following `ids`.
///
/// Every id must have a matching item; the result is returned in `ids` order.
pub fn resequence<T: Sequenced>(ids: &[Uuid], items: Vec<T>) -> AppResult<Vec<T>> {
    validate_sequence(ids)?;

    let mut by_id: HashMap<Uuid, T> = items.into_iter().map(|item| (item.id(), item)).collect();
    let now = Utc::now();

    ids.iter()
        .enumerate()
        .map(|(index, id)| {
            let mut item = by_id
                .remove(id)
                .ok_or_else(|| AppError::NotFound(format!("id {} not found", id)))?;
            let order = i32::try_from(index + 1)
                .map_err(|_| AppError::InvalidOperation("reorder list too long".to_string()))?;
            item.set_sequence(order, now);
            Ok(item)
        })
        .collect()
}

/// Next order value after the largest one present (1 when empty)
pub fn next_sequence<'a, T: Sequenced + 'a>(items: impl IntoIterator<Item = &'a T>) -> i32 {
    items
        .into_iter()
        .map(Sequenced::sequence)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}
