//! Infrastructure adapters for the access-control ports.

#![forbid(unsafe_code)]

mod in_memory_access_repository;
mod postgres_access_repository;
mod schema;

pub use in_memory_access_repository::InMemoryAccessRepository;
pub use postgres_access_repository::PostgresAccessRepository;
pub use schema::{MorphColumns, SchemaNames, TableNames, install_schema, schema_statements};
