//! Enrollment consolidation
//!
//! A student shows up in several overlapping streams: the roster of every
//! academic year they were enrolled in, and the internship collection. The
//! warehouse keeps exactly one enrollment row per student id, chosen by two
//! precedence rules:
//!
//! 1. Yearly rosters are applied in ascending year order and **replace**
//!    earlier records for the same student, so the latest year wins.
//! 2. Internship records only **add** a minimal stub for students that no
//!    roster mentioned; they never replace a roster record.
//!
//! Records without a student id cannot be keyed and are skipped.

use serde_json::Value;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::fields;
use crate::source::{params, resources, FetchError, Record, RecordSource};

/// What happened to a record offered to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// New student id
    Inserted,
    /// Existing record replaced (last write wins)
    Replaced,
    /// Existing record left untouched (first write wins)
    Kept,
    /// No usable student id
    Rejected,
}

/// Student id of a raw record.
///
/// Non-empty strings are used as-is and numbers by their textual form;
/// anything else (missing, null, empty, boolean, nested) has no id.
pub fn student_id(record: &Record) -> Option<String> {
    match record.get(fields::STUDENT_ID) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Ordered store of one record per student id.
///
/// Iteration order is the order in which each student id was first seen;
/// replacing a record keeps its original position.
#[derive(Debug, Default, Clone)]
pub struct EnrollmentLedger {
    positions: HashMap<String, usize>,
    records: Vec<Record>,
}

impl EnrollmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record`, replacing any record already stored for its id
    pub fn upsert(&mut self, record: Record) -> Admission {
        let Some(id) = student_id(&record) else {
            return Admission::Rejected;
        };

        match self.positions.get(&id) {
            Some(&pos) => {
                self.records[pos] = record;
                Admission::Replaced
            },
            None => {
                self.push(id, record);
                Admission::Inserted
            },
        }
    }

    /// Insert `record` only if its id is not stored yet
    pub fn insert_if_absent(&mut self, record: Record) -> Admission {
        let Some(id) = student_id(&record) else {
            return Admission::Rejected;
        };

        if self.positions.contains_key(&id) {
            Admission::Kept
        } else {
            self.push(id, record);
            Admission::Inserted
        }
    }

    fn push(&mut self, id: String, record: Record) {
        self.positions.insert(id, self.records.len());
        self.records.push(record);
    }

    pub fn get(&self, student_id: &str) -> Option<&Record> {
        self.positions.get(student_id).map(|&pos| &self.records[pos])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Minimal enrollment for a student known only from an internship record
pub fn internship_stub(internship: &Record) -> Record {
    let mut stub = Record::new();
    for key in [
        fields::STUDENT_ID,
        fields::SURNAME,
        fields::NAME,
        fields::COURSE_YEAR_ID,
    ] {
        stub.insert(
            key.to_string(),
            internship.get(key).cloned().unwrap_or(Value::Null),
        );
    }
    stub.insert(fields::ACTIVE.to_string(), Value::String("true".to_string()));
    stub
}

/// One academic year's roster
#[derive(Debug, Clone)]
pub struct YearlyPull {
    pub year: i32,
    pub records: Vec<Record>,
    /// The fetch failed and `records` is empty because of it
    pub fetch_failed: bool,
}

/// Counters describing one consolidation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub roster_records: usize,
    pub replaced: usize,
    pub stubs_added: usize,
    pub internships_already_enrolled: usize,
    pub skipped_without_id: usize,
}

/// Result of merging rosters and internships
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub ledger: EnrollmentLedger,
    pub stats: ConsolidationStats,
}

/// Merge yearly rosters and internship records into one ledger.
///
/// Pulls are applied in ascending year order whatever order they are
/// given in; pulls for the same year keep their relative order.
pub fn consolidate(mut pulls: Vec<YearlyPull>, internships: &[Record]) -> Consolidation {
    pulls.sort_by_key(|pull| pull.year);

    let mut ledger = EnrollmentLedger::new();
    let mut stats = ConsolidationStats::default();

    for pull in pulls {
        debug!(year = pull.year, records = pull.records.len(), "Applying roster");
        for record in pull.records {
            stats.roster_records += 1;
            match ledger.upsert(record) {
                Admission::Replaced => stats.replaced += 1,
                Admission::Rejected => stats.skipped_without_id += 1,
                Admission::Inserted | Admission::Kept => {},
            }
        }
    }

    for internship in internships {
        match ledger.insert_if_absent(internship_stub(internship)) {
            Admission::Inserted => stats.stubs_added += 1,
            Admission::Kept => stats.internships_already_enrolled += 1,
            Admission::Rejected => stats.skipped_without_id += 1,
            Admission::Replaced => {},
        }
    }

    info!(
        students = ledger.len(),
        roster_records = stats.roster_records,
        replaced = stats.replaced,
        stubs_added = stats.stubs_added,
        skipped_without_id = stats.skipped_without_id,
        "Enrollments consolidated"
    );

    Consolidation { ledger, stats }
}

/// Fetch the roster of every year in `years`, oldest first.
///
/// `pacing` is awaited after each call. A failed fetch yields an empty pull
/// flagged with `fetch_failed`.
pub async fn collect_enrollments<S>(
    source: &S,
    years: RangeInclusive<i32>,
    pacing: Duration,
) -> Vec<YearlyPull>
where
    S: RecordSource + ?Sized,
{
    let mut pulls = Vec::new();

    for year in years {
        let year_param = year.to_string();
        let result: Result<Vec<Record>, FetchError> = source
            .fetch(resources::ENROLLMENTS, &[(params::ACADEMIC_YEAR, year_param.as_str())])
            .await;
        let fetch_failed = result.is_err();
        let records = crate::source::absorb(resources::ENROLLMENTS, result);

        info!(year, records = records.len(), fetch_failed, "Roster fetched");
        pulls.push(YearlyPull {
            year,
            records,
            fetch_failed,
        });

        tokio::time::sleep(pacing).await;
    }

    pulls
}
