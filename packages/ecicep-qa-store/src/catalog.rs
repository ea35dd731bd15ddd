//! Identity-column discovery.
//!
//! The registry schema is not consistent about what it calls the column
//! holding a patient's RUN, so it is looked up per table instead of assumed.

use std::fmt;

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use tracing::debug;

use ecicep_qa_core::{QaError, Result};

use crate::rows::fetch_one;

/// Candidate identity columns, in priority order.
pub const ID_COLUMN_CANDIDATES: [&str; 3] = ["usuario_id", "usuario_run", "run"];

const HAS_COLUMN_SQL: &str = "
    SELECT 1 AS present
      FROM information_schema.columns
     WHERE table_schema::text = $1 AND table_name::text = $2 AND column_name::text = $3
     LIMIT 1
";

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    /// Splits `schema.table`; a bare name lives in `public`.
    pub fn parse(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((schema, name)) => Self {
                schema: schema.to_string(),
                name: name.to_string(),
            },
            None => Self {
                schema: "public".to_string(),
                name: full_name.to_string(),
            },
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Something that can answer "does this table have this column".
#[async_trait]
pub trait ColumnCatalog: Send {
    async fn has_column(&mut self, table: &TableRef, column: &str) -> Result<bool>;
}

#[async_trait]
impl ColumnCatalog for PgConnection {
    async fn has_column(&mut self, table: &TableRef, column: &str) -> Result<bool> {
        let params = [table.schema.as_str(), table.name.as_str(), column];
        let row = fetch_one(self, HAS_COLUMN_SQL, &params).await?;
        Ok(row.is_some())
    }
}

/// First of [`ID_COLUMN_CANDIDATES`] present in `table`.
pub async fn resolve_id_column<C>(catalog: &mut C, table: &TableRef) -> Result<&'static str>
where
    C: ColumnCatalog + ?Sized,
{
    for candidate in ID_COLUMN_CANDIDATES {
        if catalog.has_column(table, candidate).await? {
            debug!("{} identifies patients by {}", table, candidate);
            return Ok(candidate);
        }
    }
    Err(QaError::Schema {
        table: table.to_string(),
        candidates: ID_COLUMN_CANDIDATES.join(", "),
    })
}

/// Identity column of `usuariocontrol`: `run` when present, else
/// `usuario_id`.
pub async fn control_id_column<C>(catalog: &mut C, table: &TableRef) -> Result<&'static str>
where
    C: ColumnCatalog + ?Sized,
{
    if catalog.has_column(table, "run").await? {
        Ok("run")
    } else {
        Ok("usuario_id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    /// In-memory catalog keyed by `schema.table`.
    #[derive(Default)]
    struct FakeCatalog {
        columns: HashMap<String, HashSet<String>>,
        asked: Vec<String>,
    }

    impl FakeCatalog {
        fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
            self.columns.insert(
                TableRef::parse(table).to_string(),
                columns.iter().map(|c| c.to_string()).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl ColumnCatalog for FakeCatalog {
        async fn has_column(&mut self, table: &TableRef, column: &str) -> Result<bool> {
            self.asked.push(column.to_string());
            Ok(self
                .columns
                .get(&table.to_string())
                .map(|cols| cols.contains(column))
                .unwrap_or(false))
        }
    }

    #[test]
    fn test_table_ref_parse() {
        assert_eq!(
            TableRef::parse("public.demograficos"),
            TableRef {
                schema: "public".to_string(),
                name: "demograficos".to_string()
            }
        );
        assert_eq!(TableRef::parse("acuerdos").to_string(), "public.acuerdos");
        assert_eq!(TableRef::parse("qa.a.b").name, "a.b");
    }

    #[tokio::test]
    async fn test_resolve_only_run() {
        let mut catalog = FakeCatalog::default().with_table("public.acuerdos", &["id", "run"]);
        let table = TableRef::parse("public.acuerdos");
        assert_eq!(resolve_id_column(&mut catalog, &table).await.unwrap(), "run");
        assert_eq!(catalog.asked, vec!["usuario_id", "usuario_run", "run"]);
    }

    #[tokio::test]
    async fn test_resolve_only_usuario_id() {
        let mut catalog =
            FakeCatalog::default().with_table("public.demograficos", &["usuario_id", "estado_civil"]);
        let table = TableRef::parse("public.demograficos");
        assert_eq!(
            resolve_id_column(&mut catalog, &table).await.unwrap(),
            "usuario_id"
        );
        assert_eq!(catalog.asked, vec!["usuario_id"]);
    }

    #[tokio::test]
    async fn test_resolve_prefers_priority_order() {
        let mut catalog = FakeCatalog::default()
            .with_table("public.acuerdos", &["run", "usuario_run", "usuario_id"]);
        let table = TableRef::parse("acuerdos");
        assert_eq!(
            resolve_id_column(&mut catalog, &table).await.unwrap(),
            "usuario_id"
        );
    }

    #[tokio::test]
    async fn test_resolve_none_is_schema_error() {
        let mut catalog = FakeCatalog::default().with_table("public.acuerdos", &["id", "rut"]);
        let table = TableRef::parse("public.acuerdos");
        let err = resolve_id_column(&mut catalog, &table).await.unwrap_err();
        assert_eq!(
            err,
            QaError::Schema {
                table: "public.acuerdos".to_string(),
                candidates: "usuario_id, usuario_run, run".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_control_column_falls_back_to_usuario_id() {
        let table = TableRef::parse("public.usuariocontrol");

        let mut with_run = FakeCatalog::default().with_table("public.usuariocontrol", &["run"]);
        assert_eq!(control_id_column(&mut with_run, &table).await.unwrap(), "run");

        let mut without = FakeCatalog::default().with_table("public.usuariocontrol", &["fecha"]);
        assert_eq!(
            control_id_column(&mut without, &table).await.unwrap(),
            "usuario_id"
        );
    }
}
