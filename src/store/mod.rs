//! Relational stores backed by sea-orm

pub mod custom_field;
pub mod tree;

pub use custom_field::SeaFieldStore;
pub use tree::{DepartmentStore, PositionStore, SeaTreeStore, TreeEntity};
