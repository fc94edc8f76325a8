//! Full-refresh ingest pipeline
//!
//! Phases, in order:
//!
//! 1. Connect to the database
//! 2. Reset the schema (drop and recreate every table)
//! 3. Load base entities: courses, teachers
//! 4. Consolidate yearly rosters with internship stubs and load enrollments
//! 5. Load internships
//! 6. For each course: subjects, teacher assignments, student hours
//! 7. Close the connection
//!
//! Only phases 1 and 2 can fail the run. From phase 3 on, a failed fetch
//! counts as an empty collection and a failed load is rolled back for that
//! table alone; both are tallied in the [`RunSummary`].

use sqlx::PgPool;
use std::fmt;
use tracing::{error, info, warn};

use crate::coerce::to_text;
use crate::config::{IngestConfig, RunConfig};
use crate::consolidate::{collect_enrollments, consolidate, ConsolidationStats};
use crate::db;
use crate::error::{PipelineError, PipelineResult};
use crate::loader::{BatchLoader, LoadReport, TableRow};
use crate::models::{
    self, fields, Course, CourseTeacher, Enrollment, Internship, StudentHours, Subject, Teacher,
};
use crate::schema::{self, SchemaError};
use crate::source::{absorb, params, resources, ApiClient, Record, RecordSource};

/// Stage of a run, as it appears in the logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    ResetSchema,
    LoadBaseEntities,
    ConsolidateEnrollments,
    LoadInternships,
    CourseDetails,
    Close,
}

impl Phase {
    pub fn number(self) -> u8 {
        match self {
            Phase::Connect => 1,
            Phase::ResetSchema => 2,
            Phase::LoadBaseEntities => 3,
            Phase::ConsolidateEnrollments => 4,
            Phase::LoadInternships => 5,
            Phase::CourseDetails => 6,
            Phase::Close => 7,
        }
    }

    fn enter(self) {
        info!(phase = self.number(), "Phase {}: {}", self.number(), self);
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connect => "Connecting to database",
            Phase::ResetSchema => "Resetting schema",
            Phase::LoadBaseEntities => "Loading courses and teachers",
            Phase::ConsolidateEnrollments => "Consolidating and loading enrollments",
            Phase::LoadInternships => "Loading internships",
            Phase::CourseDetails => "Loading per-course details",
            Phase::Close => "Closing database connection",
        };
        f.write_str(name)
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// One report per load call, in execution order
    pub loads: Vec<LoadReport>,
    /// Fetches that failed and were treated as empty
    pub fetch_failures: usize,
    pub courses_processed: usize,
    pub consolidation: ConsolidationStats,
}

impl RunSummary {
    fn record(&mut self, report: LoadReport) {
        self.loads.push(report);
    }

    pub fn failed_loads(&self) -> usize {
        self.loads.iter().filter(|r| r.is_failure()).count()
    }

    pub fn total_inserted(&self) -> u64 {
        self.loads.iter().map(LoadReport::inserted).sum()
    }

    /// Rows stored in `table` across every load call
    pub fn inserted_into(&self, table: &str) -> u64 {
        self.loads
            .iter()
            .filter(|r| r.table == table)
            .map(LoadReport::inserted)
            .sum()
    }

    /// The run finished but something was skipped along the way
    pub fn is_degraded(&self) -> bool {
        self.fetch_failures > 0 || self.failed_loads() > 0
    }

    pub fn log(&self) {
        for table in schema::table_names() {
            info!(table = %table, inserted = self.inserted_into(table), "Table total");
        }

        if self.is_degraded() {
            warn!(
                inserted = self.total_inserted(),
                courses = self.courses_processed,
                fetch_failures = self.fetch_failures,
                failed_loads = self.failed_loads(),
                "Ingest finished with partial failures"
            );
        } else {
            info!(
                inserted = self.total_inserted(),
                courses = self.courses_processed,
                "Ingest finished"
            );
        }
    }
}

/// Course ids in retrieval order; records without one are skipped
pub fn course_ids(courses: &[Record]) -> Vec<String> {
    courses
        .iter()
        .filter_map(|course| {
            match to_text(course.get(fields::COURSE_YEAR_ID)).filter(|id| !id.is_empty()) {
                Some(id) => Some(id),
                None => {
                    warn!("Course record without {}, skipping its details", fields::COURSE_YEAR_ID);
                    None
                },
            }
        })
        .collect()
}

/// Runs every phase after the connection is open
pub struct Pipeline<S> {
    source: S,
    db: PgPool,
    loader: BatchLoader,
    run: RunConfig,
}

impl<S: RecordSource> Pipeline<S> {
    pub fn new(source: S, db: PgPool, run: RunConfig) -> Self {
        let loader = BatchLoader::new(db.clone(), run.batch_size);
        Self {
            source,
            db,
            loader,
            run,
        }
    }

    pub async fn reset_schema(&self) -> Result<(), SchemaError> {
        Phase::ResetSchema.enter();
        schema::reset(&self.db).await
    }

    /// Reset the schema, then load everything
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        self.reset_schema().await?;
        Ok(self.load_all().await)
    }

    /// Phases 3 to 6. Never fails; problems end up in the summary.
    pub async fn load_all(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        Phase::LoadBaseEntities.enter();
        let courses = self.fetch(resources::COURSES, &[], &mut summary).await;
        self.load(&models::rows(&courses, Course::from_record), &mut summary)
            .await;

        let teachers = self.fetch(resources::TEACHERS, &[], &mut summary).await;
        self.load(&models::rows(&teachers, Teacher::from_record), &mut summary)
            .await;

        Phase::ConsolidateEnrollments.enter();
        let pulls = collect_enrollments(&self.source, self.run.years(), self.run.pacing()).await;
        summary.fetch_failures += pulls.iter().filter(|p| p.fetch_failed).count();

        let internships = self
            .fetch(
                resources::INTERNSHIPS,
                &[
                    (params::DATE_FROM, self.run.internship_from.as_str()),
                    (params::DATE_TO, self.run.internship_to.as_str()),
                ],
                &mut summary,
            )
            .await;

        let consolidation = consolidate(pulls, &internships);
        summary.consolidation = consolidation.stats;
        let enrolled = consolidation.ledger.into_records();
        let enrollments = models::rows(&enrolled, Enrollment::from_record);
        self.load(&enrollments, &mut summary).await;

        Phase::LoadInternships.enter();
        self.load(&models::rows(&internships, Internship::from_record), &mut summary)
            .await;

        Phase::CourseDetails.enter();
        let ids = course_ids(&courses);
        info!(courses = ids.len(), "Loading details for each course");

        for id in &ids {
            tokio::time::sleep(self.run.pacing()).await;
            self.load_course(id, &mut summary).await;
            summary.courses_processed += 1;
        }

        summary
    }

    async fn load_course(&self, course_year_id: &str, summary: &mut RunSummary) {
        let filter = [(params::COURSE_YEAR_ID, course_year_id)];

        let subjects = self.fetch(resources::COURSE_SUBJECTS, &filter, summary).await;
        let rows = models::rows(&subjects, |r| Subject::from_record(course_year_id, r));
        self.load(&rows, summary).await;

        let assignments = self.fetch(resources::COURSE_TEACHERS, &filter, summary).await;
        let rows = models::rows(&assignments, |r| CourseTeacher::from_record(course_year_id, r));
        self.load(&rows, summary).await;

        let hours = self.fetch(resources::STUDENT_HOURS, &filter, summary).await;
        let rows = models::rows(&hours, |r| StudentHours::from_record(course_year_id, r));
        self.load(&rows, summary).await;
    }

    async fn fetch(
        &self,
        resource: &str,
        query: &[(&str, &str)],
        summary: &mut RunSummary,
    ) -> Vec<Record> {
        let result = self.source.fetch(resource, query).await;
        if result.is_err() {
            summary.fetch_failures += 1;
        }
        absorb(resource, result)
    }

    async fn load<R: TableRow>(&self, rows: &[R], summary: &mut RunSummary) {
        summary.record(self.loader.load(rows).await);
    }
}

fn api_client(config: &IngestConfig) -> PipelineResult<ApiClient> {
    info!(
        base_url = %config.api.base_url,
        api_key = %config.api.token.preview(),
        timeout_secs = config.api.timeout_secs,
        "API client configured"
    );
    ApiClient::new(
        config.api.base_url.clone(),
        config.api.token.clone(),
        config.api.timeout(),
    )
    .map_err(PipelineError::HttpClient)
}

async fn open(config: &IngestConfig) -> PipelineResult<PgPool> {
    Phase::Connect.enter();
    db::connect(&config.database).await.map_err(|e| {
        error!(error = %e, "Could not connect to the database");
        PipelineError::Connect(e)
    })
}

/// Complete run against the configured API and database
pub async fn run_pipeline(config: &IngestConfig) -> PipelineResult<RunSummary> {
    info!(
        years = ?config.run.years(),
        pacing_ms = config.run.pacing_ms,
        batch_size = config.run.batch_size,
        "Starting ITS ingest"
    );

    let source = api_client(config)?;
    let pool = open(config).await?;
    let pipeline = Pipeline::new(source, pool.clone(), config.run.clone());

    let result = pipeline.run().await;

    Phase::Close.enter();
    db::close(pool).await;

    let summary = result?;
    summary.log();
    Ok(summary)
}

/// Connect, drop and recreate every table, disconnect
pub async fn reset_only(config: &IngestConfig) -> PipelineResult<()> {
    let pool = open(config).await?;

    Phase::ResetSchema.enter();
    let result = schema::reset(&pool).await;

    Phase::Close.enter();
    db::close(pool).await;

    result.map_err(PipelineError::from)
}
