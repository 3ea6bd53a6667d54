//! Entity module - SeaORM entity definitions

pub mod custom_field;
pub mod department;
pub mod employee;
pub mod position;
