//! Parameterised reads returning named-field rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

use ecicep_qa_core::{DictRow, QaError, Result};

/// Runs `query` with text parameters bound as `$1..$n` and returns the
/// first row, or `None` when nothing matched.
pub async fn fetch_one(
    conn: &mut PgConnection,
    query: &str,
    params: &[&str],
) -> Result<Option<DictRow>> {
    debug!("fetch_one: {} {:?}", compact(query), params);
    let mut q = sqlx::query(query);
    for param in params {
        q = q.bind(*param);
    }
    let row = q
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| QaError::Database(format!("Query failed ({}): {}", compact(query), e)))?;
    row.as_ref().map(row_to_dict).transpose()
}

/// Like [`fetch_one`] but returns every row.
pub async fn fetch_all(
    conn: &mut PgConnection,
    query: &str,
    params: &[&str],
) -> Result<Vec<DictRow>> {
    debug!("fetch_all: {} {:?}", compact(query), params);
    let mut q = sqlx::query(query);
    for param in params {
        q = q.bind(*param);
    }
    let rows = q
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| QaError::Database(format!("Query failed ({}): {}", compact(query), e)))?;
    rows.iter().map(row_to_dict).collect()
}

/// Presents a row as a mapping of column name to value.
///
/// Fails with [`QaError::CursorMode`] when a column is anonymous, when two
/// columns share a name, or when a column's type has no named-field
/// representation.
pub fn row_to_dict(row: &PgRow) -> Result<DictRow> {
    let mut dict = DictRow::new();
    for column in row.columns() {
        let name = column.name();
        if name.is_empty() || name == "?column?" {
            return Err(QaError::CursorMode(format!(
                "column {} has no name; alias it in the query",
                column.ordinal()
            )));
        }
        let value = decode(row, column.ordinal(), name, column.type_info().name())?;
        if !dict.insert(name, value) {
            return Err(QaError::CursorMode(format!(
                "column '{}' appears more than once",
                name
            )));
        }
    }
    Ok(dict)
}

fn decode(row: &PgRow, idx: usize, name: &str, type_name: &str) -> Result<Value> {
    let is_null = row
        .try_get_raw(idx)
        .map(|raw| raw.is_null())
        .map_err(|e| decode_error(name, e))?;
    if is_null {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(get(row, idx, name)?),
        "INT2" => Value::from(get::<i16>(row, idx, name)?),
        "INT4" => Value::from(get::<i32>(row, idx, name)?),
        "INT8" => Value::from(get::<i64>(row, idx, name)?),
        "FLOAT4" => Value::from(f64::from(get::<f32>(row, idx, name)?)),
        "FLOAT8" => Value::from(get::<f64>(row, idx, name)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(get(row, idx, name)?),
        "DATE" => Value::String(get::<NaiveDate>(row, idx, name)?.to_string()),
        "TIMESTAMP" => Value::String(get::<NaiveDateTime>(row, idx, name)?.to_string()),
        "TIMESTAMPTZ" => Value::String(get::<DateTime<Utc>>(row, idx, name)?.to_rfc3339()),
        other => {
            return Err(QaError::CursorMode(format!(
                "column '{}' has type {} with no named-field representation; cast it to text",
                name, other
            )))
        }
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow, idx: usize, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<T, _>(idx).map_err(|e| decode_error(name, e))
}

fn decode_error(name: &str, e: sqlx::Error) -> QaError {
    QaError::Database(format!("Failed to decode column '{}': {}", name, e))
}

/// Single-line form of a query for log and error messages.
fn compact(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
