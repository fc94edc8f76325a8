//! Typed rows for the seven warehouse tables
//!
//! Each row type maps one raw API record onto its table's columns, applying
//! the coercions from [`crate::coerce`]. Text columns keep the API's opaque
//! (mostly hashed) values as they are.

use chrono::NaiveDate;
use sqlx::query_builder::Separated;
use sqlx::Postgres;

use crate::coerce::{parse_date, to_bool, to_int, to_text};
use crate::loader::TableRow;
use crate::schema::tables;
use crate::source::Record;

/// Field names used by the API
pub mod fields {
    pub const COURSE_YEAR_ID: &str = "idCorsoAnno";
    pub const COURSE_CODE: &str = "CodiceCorso";
    pub const COURSE_NAME: &str = "Corso";
    pub const YEAR: &str = "Anno";
    pub const SECTION: &str = "Sezione";
    pub const START_DATE: &str = "DataInizio";
    pub const END_DATE: &str = "DataFine";
    pub const INTERNSHIP_START: &str = "DataInizioStage";
    pub const INTERNSHIP_END: &str = "DataFineStage";
    pub const ENROLLED: &str = "Iscritti";

    pub const USER_ID: &str = "idUtente";
    pub const SURNAME: &str = "Cognome";
    pub const NAME: &str = "Nome";
    pub const EMAIL: &str = "Email";

    pub const STUDENT_ID: &str = "idAlunno";
    pub const TAX_CODE: &str = "CF";
    pub const BIRTH_DATE: &str = "DataNascita";
    pub const SEX: &str = "Sesso";
    pub const DIPLOMA_GRADE: &str = "VotoDiploma";
    pub const ACTIVE: &str = "AlunnoAttivo";
    pub const WITHDRAWN: &str = "RitiratoCorso";

    pub const COMPANY: &str = "Azienda";
    pub const VAT_NUMBER: &str = "PI";

    pub const SUBJECT_ID: &str = "idMateria";
    pub const SUBJECT: &str = "Materia";
    pub const SUBJECT_CODE: &str = "CodiceMateria";
    pub const PLANNED_HOURS: &str = "OrePreviste";
    pub const DELIVERED_HOURS: &str = "OreEffettuate";
    pub const SCHEDULED_HOURS: &str = "OrePianificate";
    pub const ALLOTTED_HOURS: &str = "MonteOre";
    pub const WORKED_HOURS: &str = "OreLavorate";
    pub const ATTENDED_MINUTES: &str = "MinutiPresenza";
    pub const LESSON_MINUTES: &str = "MinutiLezione";
    pub const AVERAGE_GRADE: &str = "VotoMedio";
}

fn text(record: &Record, field: &str) -> Option<String> {
    to_text(record.get(field))
}

fn date(record: &Record, field: &str) -> Option<NaiveDate> {
    parse_date(record.get(field))
}

fn int(record: &Record, field: &str) -> i32 {
    to_int(record.get(field), 0)
}

/// Row of `corsi`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub year: Option<String>,
    pub section: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub internship_start: Option<NaiveDate>,
    pub internship_end: Option<NaiveDate>,
    pub enrolled: i32,
}

impl Course {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: text(record, fields::COURSE_YEAR_ID),
            code: text(record, fields::COURSE_CODE),
            name: text(record, fields::COURSE_NAME),
            year: text(record, fields::YEAR),
            section: text(record, fields::SECTION),
            start_date: date(record, fields::START_DATE),
            end_date: date(record, fields::END_DATE),
            internship_start: date(record, fields::INTERNSHIP_START),
            internship_end: date(record, fields::INTERNSHIP_END),
            enrolled: int(record, fields::ENROLLED),
        }
    }
}

impl TableRow for Course {
    const TABLE: &'static str = tables::COURSES;
    const COLUMNS: &'static [&'static str] = &[
        "id_corso_anno",
        "codice_corso",
        "nome_corso",
        "anno",
        "sezione",
        "data_inizio",
        "data_fine",
        "data_inizio_stage",
        "data_fine_stage",
        "iscritti",
    ];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id)
            .push_bind(&self.code)
            .push_bind(&self.name)
            .push_bind(&self.year)
            .push_bind(&self.section)
            .push_bind(self.start_date)
            .push_bind(self.end_date)
            .push_bind(self.internship_start)
            .push_bind(self.internship_end)
            .push_bind(self.enrolled);
    }
}

/// Row of `docenti`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub user_id: Option<String>,
    pub surname_hash: Option<String>,
    pub name_hash: Option<String>,
    pub email_hash: Option<String>,
}

impl Teacher {
    pub fn from_record(record: &Record) -> Self {
        Self {
            user_id: text(record, fields::USER_ID),
            surname_hash: text(record, fields::SURNAME),
            name_hash: text(record, fields::NAME),
            email_hash: text(record, fields::EMAIL),
        }
    }
}

impl TableRow for Teacher {
    const TABLE: &'static str = tables::TEACHERS;
    const COLUMNS: &'static [&'static str] = &["id_utente", "cognome_hash", "nome_hash", "email_hash"];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.user_id)
            .push_bind(&self.surname_hash)
            .push_bind(&self.name_hash)
            .push_bind(&self.email_hash);
    }
}

/// Row of `iscrizioni_its`, built from a consolidated enrollment record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub student_id: Option<String>,
    pub surname_hash: Option<String>,
    pub name_hash: Option<String>,
    pub tax_code_hash: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub email_hash: Option<String>,
    pub diploma_grade: Option<String>,
    pub active: bool,
    pub withdrawn: bool,
    pub course_year_id: Option<String>,
}

impl Enrollment {
    pub fn from_record(record: &Record) -> Self {
        Self {
            student_id: text(record, fields::STUDENT_ID),
            surname_hash: text(record, fields::SURNAME),
            name_hash: text(record, fields::NAME),
            tax_code_hash: text(record, fields::TAX_CODE),
            birth_date: date(record, fields::BIRTH_DATE),
            sex: text(record, fields::SEX),
            email_hash: text(record, fields::EMAIL),
            diploma_grade: text(record, fields::DIPLOMA_GRADE),
            active: to_bool(record.get(fields::ACTIVE)),
            withdrawn: to_bool(record.get(fields::WITHDRAWN)),
            course_year_id: text(record, fields::COURSE_YEAR_ID),
        }
    }
}

impl TableRow for Enrollment {
    const TABLE: &'static str = tables::ENROLLMENTS;
    const COLUMNS: &'static [&'static str] = &[
        "id_alunno",
        "cognome_hash",
        "nome_hash",
        "cf_hash",
        "data_nascita",
        "sesso",
        "email_hash",
        "voto_diploma",
        "alunno_attivo",
        "ritirato_corso",
        "id_corso_anno",
    ];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.student_id)
            .push_bind(&self.surname_hash)
            .push_bind(&self.name_hash)
            .push_bind(&self.tax_code_hash)
            .push_bind(self.birth_date)
            .push_bind(&self.sex)
            .push_bind(&self.email_hash)
            .push_bind(&self.diploma_grade)
            .push_bind(self.active)
            .push_bind(self.withdrawn)
            .push_bind(&self.course_year_id);
    }
}

/// Row of `stage_its`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Internship {
    pub student_id: Option<String>,
    pub course_year_id: Option<String>,
    pub company_hash: Option<String>,
    pub vat_number_hash: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Internship {
    pub fn from_record(record: &Record) -> Self {
        Self {
            student_id: text(record, fields::STUDENT_ID),
            course_year_id: text(record, fields::COURSE_YEAR_ID),
            company_hash: text(record, fields::COMPANY),
            vat_number_hash: text(record, fields::VAT_NUMBER),
            start_date: date(record, fields::INTERNSHIP_START),
            end_date: date(record, fields::INTERNSHIP_END),
        }
    }
}

impl TableRow for Internship {
    const TABLE: &'static str = tables::INTERNSHIPS;
    const COLUMNS: &'static [&'static str] = &[
        "id_alunno",
        "id_corso_anno",
        "azienda_hash",
        "partita_iva_hash",
        "data_inizio_stage",
        "data_fine_stage",
    ];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.student_id)
            .push_bind(&self.course_year_id)
            .push_bind(&self.company_hash)
            .push_bind(&self.vat_number_hash)
            .push_bind(self.start_date)
            .push_bind(self.end_date);
    }
}

/// Row of `materie_its`. The course id comes from the request, not the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub course_year_id: String,
    pub subject_id: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub planned_hours: i32,
    pub delivered_hours: i32,
    pub scheduled_hours: i32,
}

impl Subject {
    pub fn from_record(course_year_id: &str, record: &Record) -> Self {
        Self {
            course_year_id: course_year_id.to_string(),
            subject_id: text(record, fields::SUBJECT_ID),
            name: text(record, fields::SUBJECT),
            code: text(record, fields::SUBJECT_CODE),
            planned_hours: int(record, fields::PLANNED_HOURS),
            delivered_hours: int(record, fields::DELIVERED_HOURS),
            scheduled_hours: int(record, fields::SCHEDULED_HOURS),
        }
    }
}

impl TableRow for Subject {
    const TABLE: &'static str = tables::SUBJECTS;
    const COLUMNS: &'static [&'static str] = &[
        "id_corso_anno",
        "id_materia",
        "materia_nome",
        "codice_materia",
        "ore_previste",
        "ore_effettuate",
        "ore_pianificate",
    ];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.course_year_id)
            .push_bind(&self.subject_id)
            .push_bind(&self.name)
            .push_bind(&self.code)
            .push_bind(self.planned_hours)
            .push_bind(self.delivered_hours)
            .push_bind(self.scheduled_hours);
    }
}

/// Row of `corso_docenti_its`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseTeacher {
    pub course_year_id: String,
    pub user_id: Option<String>,
    pub subject: Option<String>,
    pub allotted_hours: i32,
    pub worked_hours: i32,
}

impl CourseTeacher {
    pub fn from_record(course_year_id: &str, record: &Record) -> Self {
        Self {
            course_year_id: course_year_id.to_string(),
            user_id: text(record, fields::USER_ID),
            subject: text(record, fields::SUBJECT),
            allotted_hours: int(record, fields::ALLOTTED_HOURS),
            worked_hours: int(record, fields::WORKED_HOURS),
        }
    }
}

impl TableRow for CourseTeacher {
    const TABLE: &'static str = tables::COURSE_TEACHERS;
    const COLUMNS: &'static [&'static str] =
        &["id_corso_anno", "id_utente", "materia", "monte_ore", "ore_lavorate"];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.course_year_id)
            .push_bind(&self.user_id)
            .push_bind(&self.subject)
            .push_bind(self.allotted_hours)
            .push_bind(self.worked_hours);
    }
}

/// Row of `ore_alunno_its`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentHours {
    pub student_id: Option<String>,
    pub course_year_id: String,
    pub subject: Option<String>,
    pub planned_hours: i32,
    pub attended_minutes: i32,
    pub lesson_minutes: i32,
    pub average_grade: Option<String>,
}

impl StudentHours {
    pub fn from_record(course_year_id: &str, record: &Record) -> Self {
        Self {
            student_id: text(record, fields::STUDENT_ID),
            course_year_id: course_year_id.to_string(),
            subject: text(record, fields::SUBJECT),
            planned_hours: int(record, fields::PLANNED_HOURS),
            attended_minutes: int(record, fields::ATTENDED_MINUTES),
            lesson_minutes: int(record, fields::LESSON_MINUTES),
            average_grade: text(record, fields::AVERAGE_GRADE),
        }
    }
}

impl TableRow for StudentHours {
    const TABLE: &'static str = tables::STUDENT_HOURS;
    const COLUMNS: &'static [&'static str] = &[
        "id_alunno",
        "id_corso_anno",
        "materia",
        "ore_previste",
        "minuti_presenza",
        "minuti_lezione",
        "voto_medio",
    ];

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.student_id)
            .push_bind(&self.course_year_id)
            .push_bind(&self.subject)
            .push_bind(self.planned_hours)
            .push_bind(self.attended_minutes)
            .push_bind(self.lesson_minutes)
            .push_bind(&self.average_grade);
    }
}

/// Map every record with `f`
pub fn rows<'a, T, F>(records: &'a [Record], f: F) -> Vec<T>
where
    F: FnMut(&'a Record) -> T,
{
    records.iter().map(f).collect()
}
