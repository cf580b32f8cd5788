//! `SeaORM` Entity, generated against the schema in `migration`

pub mod prelude;

pub mod receipt_validations;
