//! REM P schema inspection.

use std::fmt;

use sqlx::postgres::PgConnection;
use tracing::debug;

use ecicep_qa_core::{QaError, Result};

use crate::rows::{fetch_all, fetch_one};

const BANNER_WIDTH: usize = 80;

const TABLE_EXISTS_SQL: &str = "
    SELECT EXISTS (
        SELECT 1
          FROM information_schema.tables
         WHERE table_schema = 'public' AND table_name::text = $1
    ) AS present
";

const TABLE_COLUMNS_SQL: &str = "
    SELECT column_name::text AS column_name, data_type::text AS data_type
      FROM information_schema.columns
     WHERE table_schema = 'public' AND table_name::text = $1
     ORDER BY ordinal_position
";

const TABLES_LIKE_SQL: &str = "
    SELECT table_name::text AS table_name
      FROM information_schema.tables
     WHERE table_schema = 'public' AND table_name::text LIKE $1
     ORDER BY table_name
";

/// Row count plus column layout of an optional table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub rows: i64,
    pub columns: Vec<(String, String)>,
}

/// Snapshot of the tables REM P 2025 reporting draws on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaReport {
    pub usuarios: i64,
    /// `None` when `usuarios_patologias` does not exist
    pub usuarios_patologias: Option<TableSummary>,
    pub patologias: i64,
    pub screening_exams: Option<i64>,
    pub exam_tables: Vec<String>,
    pub pathology_tables: Vec<String>,
    pub history_tables: Vec<String>,
}

pub async fn inspect(conn: &mut PgConnection) -> Result<SchemaReport> {
    let usuarios = count(conn, "usuarios").await?;

    let usuarios_patologias = if table_exists(conn, "usuarios_patologias").await? {
        Some(TableSummary {
            rows: count(conn, "usuarios_patologias").await?,
            columns: columns(conn, "usuarios_patologias").await?,
        })
    } else {
        None
    };

    let patologias = count(conn, "patologias").await?;

    let screening_exams = if table_exists(conn, "examenes_screening_normalizado").await? {
        Some(count(conn, "examenes_screening_normalizado").await?)
    } else {
        None
    };

    Ok(SchemaReport {
        usuarios,
        usuarios_patologias,
        patologias,
        screening_exams,
        exam_tables: tables_like(conn, "%exam%").await?,
        pathology_tables: tables_like(conn, "%patolog%").await?,
        history_tables: tables_like(conn, "%historial").await?,
    })
}

/// Only called with fixed table names from this module.
async fn count(conn: &mut PgConnection, table: &'static str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) AS total FROM public.{}", table);
    let row = fetch_one(conn, &sql, &[]).await?;
    let total = row
        .as_ref()
        .and_then(|row| row.get("total"))
        .and_then(|value| value.as_i64())
        .ok_or_else(|| QaError::Database(format!("COUNT on public.{} returned no total", table)))?;
    debug!("public.{} has {} rows", table, total);
    Ok(total)
}

async fn table_exists(conn: &mut PgConnection, table: &str) -> Result<bool> {
    let row = fetch_one(conn, TABLE_EXISTS_SQL, &[table]).await?;
    Ok(row
        .as_ref()
        .and_then(|row| row.get("present"))
        .and_then(|value| value.as_bool())
        .unwrap_or(false))
}

async fn columns(conn: &mut PgConnection, table: &str) -> Result<Vec<(String, String)>> {
    let rows = fetch_all(conn, TABLE_COLUMNS_SQL, &[table]).await?;
    Ok(rows
        .iter()
        .map(|row| {
            (
                row.text("column_name").unwrap_or_default(),
                row.text("data_type").unwrap_or_default(),
            )
        })
        .collect())
}

async fn tables_like(conn: &mut PgConnection, pattern: &str) -> Result<Vec<String>> {
    let rows = fetch_all(conn, TABLES_LIKE_SQL, &[pattern]).await?;
    Ok(rows.iter().filter_map(|row| row.text("table_name")).collect())
}

/// `1234567` as `1,234,567`.
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn write_list(f: &mut fmt::Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", title)?;
    if items.is_empty() {
        writeln!(f, "   (none)")?;
    }
    for item in items {
        writeln!(f, "   • {}", item)?;
    }
    Ok(())
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(BANNER_WIDTH);
        writeln!(f, "{}", rule)?;
        writeln!(f, "REM P 2025 schema analysis")?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        writeln!(f, "Total usuarios: {}", thousands(self.usuarios))?;

        match &self.usuarios_patologias {
            Some(summary) => {
                writeln!(
                    f,
                    "Registros usuarios_patologias: {}",
                    thousands(summary.rows)
                )?;
                writeln!(f)?;
                writeln!(f, "Columnas de usuarios_patologias:")?;
                for (name, data_type) in &summary.columns {
                    writeln!(f, "   • {}: {}", name, data_type)?;
                }
            }
            None => writeln!(f, "Tabla usuarios_patologias: not present")?,
        }

        writeln!(f)?;
        writeln!(f, "Total patologías en catálogo: {}", thousands(self.patologias))?;
        match self.screening_exams {
            Some(total) => writeln!(f, "Exámenes screening: {}", thousands(total))?,
            None => writeln!(f, "Tabla examenes_screening_normalizado: not present")?,
        }

        write_list(f, "Tablas de exámenes disponibles:", &self.exam_tables)?;
        write_list(f, "Tablas de patologías disponibles:", &self.pathology_tables)?;
        write_list(f, "Tablas historial disponibles:", &self.history_tables)?;

        writeln!(f)?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Analysis complete")?;
        write!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(thousands(-45210), "-45,210");
    }

    #[test]
    fn test_display_full_report() {
        let report = SchemaReport {
            usuarios: 45210,
            usuarios_patologias: Some(TableSummary {
                rows: 1520,
                columns: vec![
                    ("usuario_id".to_string(), "text".to_string()),
                    ("patologia_id".to_string(), "integer".to_string()),
                ],
            }),
            patologias: 312,
            screening_exams: Some(8001),
            exam_tables: vec!["examenes_screening_normalizado".to_string()],
            pathology_tables: vec!["patologias".to_string(), "usuarios_patologias".to_string()],
            history_tables: vec![],
        };
        let text = report.to_string();
        assert!(text.contains("Total usuarios: 45,210"));
        assert!(text.contains("Registros usuarios_patologias: 1,520"));
        assert!(text.contains("   • patologia_id: integer"));
        assert!(text.contains("Exámenes screening: 8,001"));
        assert!(text.contains("Tablas historial disponibles:\n   (none)"));

        let usuario_col = text.find("usuario_id: text").unwrap();
        let patologia_col = text.find("patologia_id: integer").unwrap();
        assert!(usuario_col < patologia_col);
    }

    #[test]
    fn test_display_absent_tables() {
        let text = SchemaReport::default().to_string();
        assert!(text.contains("usuarios_patologias: not present"));
        assert!(text.contains("examenes_screening_normalizado: not present"));
        assert!(text.starts_with(&"=".repeat(BANNER_WIDTH)));
    }
}
