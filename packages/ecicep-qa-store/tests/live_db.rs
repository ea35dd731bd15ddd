//! Tests against a real PostgreSQL server.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p ecicep-qa-store -- --ignored`.
//! Catalog tests work inside a throwaway schema. The verifier and
//! inspection read fixed `public.` tables, so their tests create a
//! throwaway database instead, which needs a role with `CREATEDB`.

use rand::Rng;
use sqlx::postgres::PgConnection;
use sqlx::Executor;
use url::Url;

use ecicep_qa_core::form::FullRecord;
use ecicep_qa_core::{DbConfig, QaError, Run};
use ecicep_qa_store::{
    close, connect, connect_options, control_id_column, fetch_one, resolve_id_column,
    ColumnCatalog, PgStore, TableRef, TableSummary,
};

const REGISTRY_TABLES: &str = "
    CREATE TYPE cumplimiento_acuerdo AS ENUM ('cumple', 'no_cumple');
    CREATE TABLE sectores (id integer PRIMARY KEY, nombre text);
    CREATE TABLE usuarios (
        run text PRIMARY KEY,
        nombre varchar(120),
        telefono bigint,
        ingreso_ecicep integer,
        en_programa_cv boolean
    );
    CREATE TABLE demograficos (
        usuario_id text,
        nivel_educacional varchar(60),
        origen_etnico text,
        estado_civil text
    );
    CREATE TABLE usuariocontrol (
        run text,
        profesional text,
        peso numeric(5, 1),
        talla numeric(5, 1),
        fecha date
    );
    CREATE TABLE acuerdos (
        usuario_run text,
        acuerdos text,
        cumplimiento cumplimiento_acuerdo,
        fecha_creacion timestamptz
    );
    CREATE TABLE patologias (id integer PRIMARY KEY, cie10 varchar(10));
    CREATE TABLE usuarios_patologias (usuario_id text, patologia_id integer);
    INSERT INTO sectores VALUES (3, 'Norte'), (1, 'Centro');
    INSERT INTO patologias VALUES (1, 'E11'), (2, 'I10'), (3, 'J45');
";

async fn open() -> PgConnection {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
    let options = connect_options(&DbConfig::Url(url)).unwrap();
    connect(&options).await.unwrap()
}

async fn scratch_schema(conn: &mut PgConnection) -> String {
    let schema = format!("qa_scratch_{}", rand::thread_rng().gen_range(100_000..999_999));
    conn.execute(format!("CREATE SCHEMA {}", schema).as_str())
        .await
        .unwrap();
    schema
}

async fn drop_schema(mut conn: PgConnection, schema: &str) {
    conn.execute(format!("DROP SCHEMA {} CASCADE", schema).as_str())
        .await
        .unwrap();
    close(conn).await;
}

/// Database created for one test and removed by [`drop_database`].
struct ThrowawayDb {
    name: String,
    config: DbConfig,
}

async fn create_database() -> ThrowawayDb {
    let base = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
    let name = format!("qa_verify_{}", rand::thread_rng().gen_range(100_000..999_999));

    let mut admin = open().await;
    admin
        .execute(format!("CREATE DATABASE {}", name).as_str())
        .await
        .unwrap();
    close(admin).await;

    let mut url = Url::parse(&base).unwrap();
    url.set_path(&format!("/{}", name));
    let config = DbConfig::Url(url.to_string());

    let mut conn = connect(&connect_options(&config).unwrap()).await.unwrap();
    conn.execute(REGISTRY_TABLES).await.unwrap();
    close(conn).await;

    ThrowawayDb { name, config }
}

async fn drop_database(db: ThrowawayDb) {
    let mut admin = open().await;
    admin
        .execute(format!("DROP DATABASE {} WITH (FORCE)", db.name).as_str())
        .await
        .unwrap();
    close(admin).await;
}

/// Stores `record` for `run` the way a successful full-form save does.
async fn save_full_record(db: &ThrowawayDb, run: &Run, record: &FullRecord) {
    let mut conn = connect(&connect_options(&db.config).unwrap()).await.unwrap();
    let dotted = run.dotted();

    sqlx::query("INSERT INTO usuarios VALUES ($1, $2, $3::bigint, 1, true)")
        .bind(&dotted)
        .bind(&record.nombre)
        .bind(&record.telefono)
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO demograficos VALUES ($1, $2, $3, $4)")
        .bind(&dotted)
        .bind(&record.nivel_educacional)
        .bind(&record.origen_etnico)
        .bind(&record.estado_civil)
        .execute(&mut conn)
        .await
        .unwrap();
    // Only the latest control is compared.
    sqlx::query(
        "INSERT INTO usuariocontrol VALUES
            ($1, 'Otro Profesional', 70.0, 165.0, DATE '2024-01-10'),
            ($1, $2, 72.5, 165.0, DATE '2025-10-19')",
    )
    .bind(&dotted)
    .bind(&record.profesional)
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query("INSERT INTO acuerdos VALUES ($1, $2, $3::text::cumplimiento_acuerdo, now())")
        .bind(&dotted)
        .bind(&record.acuerdo)
        .bind(&record.cumplimiento)
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO usuarios_patologias VALUES ($1, 1), ($1, 2)")
        .bind(&dotted)
        .execute(&mut conn)
        .await
        .unwrap();

    close(conn).await;
}

#[tokio::test]
#[ignore]
async fn test_id_columns_resolved_in_scratch_schema() {
    let mut conn = open().await;
    let schema = scratch_schema(&mut conn).await;
    conn.execute(
        format!(
            "CREATE TABLE {s}.acuerdos (id serial, run text, acuerdos text);
             CREATE TABLE {s}.demograficos (usuario_run text, nivel_educacional text);
             CREATE TABLE {s}.usuariocontrol (usuario_id text, profesional text);
             CREATE TABLE {s}.notas (rut text)",
            s = schema
        )
        .as_str(),
    )
    .await
    .unwrap();

    let acuerdos = TableRef::parse(&format!("{}.acuerdos", schema));
    assert!(conn.has_column(&acuerdos, "run").await.unwrap());
    assert!(!conn.has_column(&acuerdos, "usuario_id").await.unwrap());
    assert_eq!(resolve_id_column(&mut conn, &acuerdos).await.unwrap(), "run");

    let demograficos = TableRef::parse(&format!("{}.demograficos", schema));
    assert_eq!(
        resolve_id_column(&mut conn, &demograficos).await.unwrap(),
        "usuario_run"
    );

    let control = TableRef::parse(&format!("{}.usuariocontrol", schema));
    assert_eq!(
        control_id_column(&mut conn, &control).await.unwrap(),
        "usuario_id"
    );

    let notas = TableRef::parse(&format!("{}.notas", schema));
    let err = resolve_id_column(&mut conn, &notas).await.unwrap_err();
    assert!(matches!(err, QaError::Schema { .. }));

    drop_schema(conn, &schema).await;
}

#[tokio::test]
#[ignore]
async fn test_fetch_one_named_fields() {
    let mut conn = open().await;
    let row = fetch_one(
        &mut conn,
        "SELECT $1::text AS run, 42::int4 AS peso, true AS activo, NULL::text AS nota",
        &["12.345.678-5"],
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(row.text("run").as_deref(), Some("12.345.678-5"));
    assert_eq!(row.text("peso").as_deref(), Some("42"));
    assert_eq!(row.get("activo"), Some(&serde_json::Value::Bool(true)));
    assert!(row.contains("nota"));
    assert_eq!(row.text("nota"), None);

    let none = fetch_one(&mut conn, "SELECT 1 AS x WHERE false", &[])
        .await
        .unwrap();
    assert!(none.is_none());
    close(conn).await;
}

#[tokio::test]
#[ignore]
async fn test_fetch_one_rejects_unnamed_and_duplicate_columns() {
    let mut conn = open().await;

    let err = fetch_one(&mut conn, "SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, QaError::CursorMode(_)));

    let err = fetch_one(&mut conn, "SELECT 1 AS run, 2 AS run", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::CursorMode(_)));

    let err = fetch_one(&mut conn, "SELECT '{}'::jsonb AS datos", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::CursorMode(_)));

    close(conn).await;
}

#[tokio::test]
#[ignore]
async fn test_verify_full_record_reads_back_every_table() {
    let db = create_database().await;
    let store = PgStore::new(&db.config).unwrap();
    let run = Run::parse("12.345.678-5").unwrap();
    let record = FullRecord::fixture(&run);
    save_full_record(&db, &run, &record).await;

    assert_eq!(store.first_sector_id().await.unwrap(), "1");
    store
        .verify_full_record("Escenario 3", &run, &record)
        .await
        .unwrap();

    let mut conn = connect(&connect_options(&db.config).unwrap()).await.unwrap();
    conn.execute("UPDATE acuerdos SET cumplimiento = 'no_cumple'")
        .await
        .unwrap();
    close(conn).await;

    let err = store
        .verify_full_record("Escenario 3", &run, &record)
        .await
        .unwrap_err();
    match err {
        QaError::Verification { scenario, message } => {
            assert_eq!(scenario, "Escenario 3");
            assert!(message.contains("public.acuerdos.cumplimiento"), "{message}");
            assert!(message.contains("no_cumple"), "{message}");
        }
        other => panic!("expected verification error, got {other:?}"),
    }

    drop_database(db).await;
}

#[tokio::test]
#[ignore]
async fn test_verify_full_record_reports_missing_pathology() {
    let db = create_database().await;
    let store = PgStore::new(&db.config).unwrap();
    let run = Run::parse("12.345.678-5").unwrap();
    let mut record = FullRecord::fixture(&run);
    save_full_record(&db, &run, &record).await;

    record.patologias.push("J45".to_string());
    let err = store
        .verify_full_record("Escenario 3", &run, &record)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, QaError::Verification { message, .. } if message.contains("J45")),
        "{err:?}"
    );

    drop_database(db).await;
}

#[tokio::test]
#[ignore]
async fn test_inspect_reports_registry_tables() {
    let db = create_database().await;
    let store = PgStore::new(&db.config).unwrap();
    let run = Run::parse("12.345.678-5").unwrap();
    save_full_record(&db, &run, &FullRecord::fixture(&run)).await;

    let report = store.inspect().await.unwrap();
    assert_eq!(report.usuarios, 1);
    assert_eq!(report.patologias, 3);
    assert_eq!(
        report.usuarios_patologias,
        Some(TableSummary {
            rows: 2,
            columns: vec![
                ("usuario_id".to_string(), "text".to_string()),
                ("patologia_id".to_string(), "integer".to_string()),
            ],
        })
    );
    assert_eq!(report.screening_exams, None);
    assert_eq!(
        report.pathology_tables,
        vec!["patologias".to_string(), "usuarios_patologias".to_string()]
    );
    assert!(report.exam_tables.is_empty());
    assert!(report.history_tables.is_empty());

    drop_database(db).await;
}
