//! Read-back of a full-form save.
//!
//! Each table is fetched with one query and then judged by a pure check,
//! so the comparison rules are testable without a database.

use std::collections::BTreeSet;

use sqlx::postgres::PgConnection;
use tracing::{debug, info};

use ecicep_qa_core::form::FullRecord;
use ecicep_qa_core::{DictRow, QaError, Result, Run};

use crate::catalog::{control_id_column, resolve_id_column, TableRef};
use crate::rows::{fetch_all, fetch_one};

const FIRST_SECTOR_SQL: &str = "SELECT id::text AS id FROM public.sectores ORDER BY id ASC LIMIT 1";

const PROFILE_SQL: &str = "
    SELECT nombre::text AS nombre, telefono::text AS telefono,
           ingreso_ecicep::text AS ingreso_ecicep, en_programa_cv::text AS en_programa_cv
      FROM public.usuarios
     WHERE run = $1
";

const PATHOLOGIES_SQL: &str = "
    SELECT DISTINCT UPPER(p.cie10::text) AS cie10
      FROM public.usuarios_patologias up
      JOIN public.patologias p ON p.id = up.patologia_id
     WHERE regexp_replace(up.usuario_id::text, '[^0-9kK]', '', 'g')
         = regexp_replace($1, '[^0-9kK]', '', 'g')
";

fn demographics_sql(id_column: &str) -> String {
    format!(
        "SELECT nivel_educacional::text AS nivel_educacional,
                origen_etnico::text AS origen_etnico,
                estado_civil::text AS estado_civil
           FROM public.demograficos
          WHERE {}::text = $1",
        id_column
    )
}

fn control_sql(id_column: &str) -> String {
    format!(
        "SELECT profesional::text AS profesional, peso::text AS peso, talla::text AS talla
           FROM public.usuariocontrol
          WHERE {}::text = $1
          ORDER BY fecha DESC NULLS LAST
          LIMIT 1",
        id_column
    )
}

fn agreement_sql(id_column: &str) -> String {
    format!(
        "SELECT acuerdos::text AS acuerdos, cumplimiento::text AS cumplimiento
           FROM public.acuerdos
          WHERE {}::text = $1
          ORDER BY fecha_creacion DESC NULLS LAST
          LIMIT 1",
        id_column
    )
}

/// Lowest sector id, as text.
pub async fn first_sector_id(conn: &mut PgConnection) -> Result<String> {
    let row = fetch_one(conn, FIRST_SECTOR_SQL, &[]).await?;
    let id = row
        .and_then(|row| row.text("id"))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| QaError::verification("setup", "public.sectores has no sector to assign"))?;
    debug!("Using sector {}", id);
    Ok(id)
}

/// Confirms every table written by a full-form save holds what was sent.
pub async fn verify_full_record(
    conn: &mut PgConnection,
    scenario: &str,
    run: &Run,
    record: &FullRecord,
) -> Result<()> {
    let run_text = run.dotted();
    let params = [run_text.as_str()];

    let profile = fetch_one(conn, PROFILE_SQL, &params).await?;
    check_profile(scenario, profile.as_ref(), record)?;

    let demographics_table = TableRef::parse("public.demograficos");
    let column = resolve_id_column(conn, &demographics_table).await?;
    let demographics = fetch_one(conn, &demographics_sql(column), &params).await?;
    check_demographics(scenario, demographics.as_ref(), record)?;

    let control_table = TableRef::parse("public.usuariocontrol");
    let column = control_id_column(conn, &control_table).await?;
    let control = fetch_one(conn, &control_sql(column), &params).await?;
    check_control(scenario, control.as_ref(), record)?;

    let agreement_table = TableRef::parse("public.acuerdos");
    let column = resolve_id_column(conn, &agreement_table).await?;
    let agreement = fetch_one(conn, &agreement_sql(column), &params).await?;
    check_agreement(scenario, agreement.as_ref(), record)?;

    let digits = run.digits();
    let codes = fetch_all(conn, PATHOLOGIES_SQL, &[digits.as_str()]).await?;
    check_pathologies(scenario, &codes, &record.patologias)?;

    info!("Full record for {} verified across five tables", run);
    Ok(())
}

/// Compares a stored field against the submitted value. An empty expected
/// value is not compared.
fn check_field(
    scenario: &str,
    row: &DictRow,
    table: &str,
    field: &str,
    expected: &str,
) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let found = row.text(field);
    if found.as_deref() == Some(expected) {
        Ok(())
    } else {
        Err(QaError::verification(
            scenario,
            format!(
                "{}.{} is {:?}, expected {:?}",
                table,
                field,
                found.unwrap_or_default(),
                expected
            ),
        ))
    }
}

fn require<'a>(scenario: &str, row: Option<&'a DictRow>, what: &str) -> Result<&'a DictRow> {
    row.ok_or_else(|| QaError::verification(scenario, what.to_string()))
}

pub fn check_profile(scenario: &str, row: Option<&DictRow>, record: &FullRecord) -> Result<()> {
    let row = require(scenario, row, "public.usuarios has no row for the submitted RUN")?;
    let found = row.text("nombre").unwrap_or_default();
    if found != record.nombre {
        return Err(QaError::verification(
            scenario,
            format!(
                "public.usuarios.nombre is {:?}, expected {:?}",
                found, record.nombre
            ),
        ));
    }
    check_field(scenario, row, "public.usuarios", "telefono", &record.telefono)
}

pub fn check_demographics(
    scenario: &str,
    row: Option<&DictRow>,
    record: &FullRecord,
) -> Result<()> {
    let row = require(scenario, row, "public.demograficos has no row for the submitted RUN")?;
    check_field(
        scenario,
        row,
        "public.demograficos",
        "nivel_educacional",
        &record.nivel_educacional,
    )
}

pub fn check_control(scenario: &str, row: Option<&DictRow>, record: &FullRecord) -> Result<()> {
    let row = require(scenario, row, "public.usuariocontrol has no control for the submitted RUN")?;
    check_field(
        scenario,
        row,
        "public.usuariocontrol",
        "profesional",
        &record.profesional,
    )
}

pub fn check_agreement(scenario: &str, row: Option<&DictRow>, record: &FullRecord) -> Result<()> {
    let row = require(scenario, row, "public.acuerdos has no agreement for the submitted RUN")?;
    check_field(scenario, row, "public.acuerdos", "acuerdos", &record.acuerdo)?;
    check_field(
        scenario,
        row,
        "public.acuerdos",
        "cumplimiento",
        &record.cumplimiento,
    )
}

/// Every expected ICD-10 code must be among the stored ones; extra stored
/// codes are fine.
pub fn check_pathologies(scenario: &str, rows: &[DictRow], expected: &[String]) -> Result<()> {
    let stored: BTreeSet<String> = rows
        .iter()
        .filter_map(|row| row.text("cie10"))
        .filter(|code| !code.is_empty())
        .map(|code| code.to_uppercase())
        .collect();
    let missing: Vec<String> = expected
        .iter()
        .map(|code| code.to_uppercase())
        .filter(|code| !stored.contains(code))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(QaError::verification(
        scenario,
        format!(
            "public.usuarios_patologias is missing {:?} (stored: {:?})",
            missing,
            stored.into_iter().collect::<Vec<_>>()
        ),
    ))
}
