pub mod operations;
pub mod schema;


pub use operations::{CursorError, CursorKey, CursorRow, CursorStore};
pub use schema::{initialize_schema, run_migrations, SCHEMA_VERSION};
