//! Request handlers module

pub mod custom_field;
pub mod department;
pub mod position;
pub mod tree;
