//! Read-only PostgreSQL access to the ECICEP schema.
//!
//! Provides the connection factory, identity-column probing, named-field
//! row reads, the full-record verifier and the REM P schema inspection.

pub mod catalog;
pub mod connection;
pub mod inspect;
pub mod rows;
pub mod verifier;

pub use catalog::{
    control_id_column, resolve_id_column, ColumnCatalog, TableRef, ID_COLUMN_CANDIDATES,
};
pub use connection::{close, connect, connect_options, PgStore};
pub use inspect::{SchemaReport, TableSummary};
pub use rows::{fetch_all, fetch_one};
