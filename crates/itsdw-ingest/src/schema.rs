//! Target schema lifecycle
//!
//! The warehouse holds seven tables that are dropped and recreated at the
//! start of every run. [`TABLES`] lists them in dependency order: a table
//! only references tables that appear before it. Creation walks the list
//! forward, dropping walks it backward with `CASCADE`.

use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, info};

/// Table names
pub mod tables {
    pub const COURSES: &str = "corsi";
    pub const TEACHERS: &str = "docenti";
    pub const ENROLLMENTS: &str = "iscrizioni_its";
    pub const INTERNSHIPS: &str = "stage_its";
    pub const SUBJECTS: &str = "materie_its";
    pub const COURSE_TEACHERS: &str = "corso_docenti_its";
    pub const STUDENT_HOURS: &str = "ore_alunno_its";
}

/// One managed table
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub create_sql: &'static str,
}

/// All managed tables in forward dependency order
pub static TABLES: &[TableDef] = &[
    TableDef {
        name: tables::COURSES,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS corsi (
                id_corso_anno VARCHAR(50) PRIMARY KEY,
                codice_corso VARCHAR(100),
                nome_corso TEXT,
                anno VARCHAR(10),
                sezione VARCHAR(10),
                data_inizio DATE,
                data_fine DATE,
                data_inizio_stage DATE,
                data_fine_stage DATE,
                iscritti INTEGER
            )
        "#,
    },
    TableDef {
        name: tables::TEACHERS,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS docenti (
                id_utente TEXT PRIMARY KEY,
                cognome_hash TEXT,
                nome_hash TEXT,
                email_hash TEXT
            )
        "#,
    },
    TableDef {
        name: tables::ENROLLMENTS,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS iscrizioni_its (
                id_alunno TEXT PRIMARY KEY,
                cognome_hash TEXT,
                nome_hash TEXT,
                cf_hash TEXT,
                data_nascita DATE,
                sesso CHAR(1),
                email_hash TEXT,
                voto_diploma VARCHAR(50),
                alunno_attivo BOOLEAN,
                ritirato_corso BOOLEAN,
                id_corso_anno VARCHAR(50) REFERENCES corsi(id_corso_anno)
            )
        "#,
    },
    TableDef {
        name: tables::INTERNSHIPS,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS stage_its (
                id SERIAL PRIMARY KEY,
                id_alunno TEXT REFERENCES iscrizioni_its(id_alunno),
                id_corso_anno VARCHAR(50) REFERENCES corsi(id_corso_anno),
                azienda_hash TEXT,
                partita_iva_hash TEXT,
                data_inizio_stage DATE,
                data_fine_stage DATE,
                UNIQUE (id_alunno, id_corso_anno, data_inizio_stage, azienda_hash)
            )
        "#,
    },
    TableDef {
        name: tables::SUBJECTS,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS materie_its (
                id_materia TEXT,
                id_corso_anno VARCHAR(50) REFERENCES corsi(id_corso_anno),
                materia_nome TEXT,
                codice_materia VARCHAR(100),
                ore_previste INTEGER,
                ore_effettuate INTEGER,
                ore_pianificate INTEGER,
                PRIMARY KEY (id_corso_anno, id_materia)
            )
        "#,
    },
    TableDef {
        name: tables::COURSE_TEACHERS,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS corso_docenti_its (
                id SERIAL PRIMARY KEY,
                id_corso_anno VARCHAR(50) REFERENCES corsi(id_corso_anno),
                id_utente TEXT REFERENCES docenti(id_utente),
                materia TEXT,
                monte_ore INTEGER,
                ore_lavorate INTEGER,
                UNIQUE (id_corso_anno, id_utente, materia)
            )
        "#,
    },
    TableDef {
        name: tables::STUDENT_HOURS,
        create_sql: r#"
            CREATE TABLE IF NOT EXISTS ore_alunno_its (
                id SERIAL PRIMARY KEY,
                id_alunno TEXT REFERENCES iscrizioni_its(id_alunno),
                id_corso_anno VARCHAR(50),
                materia TEXT,
                ore_previste INTEGER,
                minuti_presenza INTEGER,
                minuti_lezione INTEGER,
                voto_medio VARCHAR(50),
                UNIQUE (id_alunno, id_corso_anno, materia)
            )
        "#,
    },
];

/// What the schema manager was doing when the database refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    Begin,
    Drop,
    Create,
    Commit,
}

impl std::fmt::Display for SchemaAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaAction::Begin => write!(f, "begin"),
            SchemaAction::Drop => write!(f, "drop"),
            SchemaAction::Create => write!(f, "create"),
            SchemaAction::Commit => write!(f, "commit"),
        }
    }
}

/// Schema reset failure. Always fatal for a run.
#[derive(Error, Debug)]
#[error("Schema {action} failed for '{table}': {source}")]
pub struct SchemaError {
    pub action: SchemaAction,
    pub table: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl SchemaError {
    fn new(action: SchemaAction, table: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self { action, table, source }
    }
}

/// Managed table names in creation order
pub fn table_names() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|t| t.name)
}

fn drop_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", table)
}

async fn drop_in(tx: &mut Transaction<'_, Postgres>) -> Result<(), SchemaError> {
    for table in TABLES.iter().rev() {
        debug!(table = %table.name, "Dropping table");
        sqlx::query(&drop_sql(table.name))
            .execute(&mut **tx)
            .await
            .map_err(SchemaError::new(SchemaAction::Drop, table.name))?;
    }
    Ok(())
}

async fn create_in(tx: &mut Transaction<'_, Postgres>) -> Result<(), SchemaError> {
    for table in TABLES {
        debug!(table = %table.name, "Creating table");
        sqlx::query(table.create_sql)
            .execute(&mut **tx)
            .await
            .map_err(SchemaError::new(SchemaAction::Create, table.name))?;
    }
    Ok(())
}

/// Drop every managed table, dependents first. Missing tables are fine.
pub async fn drop_all(db: &PgPool) -> Result<(), SchemaError> {
    let mut tx = db
        .begin()
        .await
        .map_err(SchemaError::new(SchemaAction::Begin, "*"))?;
    drop_in(&mut tx).await?;
    tx.commit()
        .await
        .map_err(SchemaError::new(SchemaAction::Commit, "*"))?;
    info!(tables = TABLES.len(), "Tables dropped");
    Ok(())
}

/// Create every managed table if it does not exist yet
pub async fn create_all(db: &PgPool) -> Result<(), SchemaError> {
    let mut tx = db
        .begin()
        .await
        .map_err(SchemaError::new(SchemaAction::Begin, "*"))?;
    create_in(&mut tx).await?;
    tx.commit()
        .await
        .map_err(SchemaError::new(SchemaAction::Commit, "*"))?;
    info!(tables = TABLES.len(), "Tables created");
    Ok(())
}

/// Drop and recreate the whole schema in one transaction.
///
/// On error nothing is committed, so the previous schema stays in place.
pub async fn reset(db: &PgPool) -> Result<(), SchemaError> {
    let mut tx = db
        .begin()
        .await
        .map_err(SchemaError::new(SchemaAction::Begin, "*"))?;
    drop_in(&mut tx).await?;
    create_in(&mut tx).await?;
    tx.commit()
        .await
        .map_err(SchemaError::new(SchemaAction::Commit, "*"))?;
    info!(tables = TABLES.len(), "Schema reset");
    Ok(())
}
