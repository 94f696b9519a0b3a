// Core modules: error model, addressing, row codec, ids, and seed data.
pub mod error;
pub mod ids;
pub mod range;
pub mod record;
pub mod schema;
pub mod seed;
pub mod validate;
