// src/jobs/export.rs

//! CSV export of quiz attempts.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{error::AppError, models::score::percentage};

pub const CSV_HEADER: [&str; 17] = [
    "Score ID",
    "Quiz ID",
    "User ID",
    "Username",
    "Full Name",
    "Subject ID",
    "Subject Name",
    "Chapter ID",
    "Chapter Name",
    "Quiz Name",
    "Total Scored",
    "Total Questions",
    "Percentage Score",
    "Quiz Date",
    "Quiz Duration",
    "Quiz Remarks",
    "Attempt Timestamp",
];

/// Filters applied to an export. Dates are whole days: `start_date` from its
/// first second, `end_date` through its last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub subject_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl ExportFilters {
    /// Parses `YYYY-MM-DD` strings as sent by clients.
    pub fn from_strings(
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            start_date: parse_day(start_date, "start_date")?,
            end_date: parse_day(end_date, "end_date")?,
            ..Default::default()
        })
    }

    fn start_bound(&self) -> Option<DateTime<Utc>> {
        self.start_date.map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// Exclusive upper bound: midnight after `end_date`.
    fn end_bound(&self) -> Option<DateTime<Utc>> {
        self.end_date
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }
}

fn parse_day(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Some).map_err(|_| {
            AppError::BadRequest(format!("Invalid {} format. Use YYYY-MM-DD", field))
        }),
    }
}

/// One attempt joined with its quiz, chapter, subject and user.
#[derive(Debug, Clone, FromRow)]
pub struct ExportRow {
    pub score_id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub subject_id: i64,
    pub subject_name: String,
    pub chapter_id: i64,
    pub chapter_name: String,
    pub quiz_name: String,
    pub total_scored: i32,
    pub total_questions: i32,
    pub date_of_quiz: Option<NaiveDate>,
    pub time_duration: Option<i32>,
    pub remarks: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExportResult {
    pub status: &'static str,
    pub csv_content: String,
    pub filename: String,
    pub rows: usize,
    pub message: &'static str,
}

pub async fn fetch_rows(pool: &PgPool, filters: &ExportFilters) -> Result<Vec<ExportRow>, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT
            s.id AS score_id, s.quiz_id, s.user_id, u.username, u.full_name,
            sub.id AS subject_id, sub.name AS subject_name,
            c.id AS chapter_id, c.name AS chapter_name,
            q.name AS quiz_name, s.total_scored, s.total_questions,
            q.date_of_quiz, q.time_duration, q.remarks, s.timestamp
        FROM scores s
        JOIN quizzes q ON s.quiz_id = q.id
        JOIN chapters c ON q.chapter_id = c.id
        JOIN subjects sub ON c.subject_id = sub.id
        JOIN users u ON s.user_id = u.id
        WHERE TRUE
        "#,
    );

    if let Some(start) = filters.start_bound() {
        builder.push(" AND s.timestamp >= ");
        builder.push_bind(start);
    }
    if let Some(end) = filters.end_bound() {
        builder.push(" AND s.timestamp < ");
        builder.push_bind(end);
    }
    if let Some(subject_id) = filters.subject_id {
        builder.push(" AND sub.id = ");
        builder.push_bind(subject_id);
    }
    if let Some(user_id) = filters.user_id {
        builder.push(" AND u.id = ");
        builder.push_bind(user_id);
    }
    builder.push(" ORDER BY s.timestamp DESC");

    let rows = builder
        .build_query_as::<ExportRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch export rows: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(rows)
}

pub async fn run(
    pool: &PgPool,
    filters: &ExportFilters,
    file_prefix: &str,
) -> Result<ExportResult, AppError> {
    let rows = fetch_rows(pool, filters).await?;
    tracing::info!(rows = rows.len(), "Export rows fetched");

    Ok(ExportResult {
        status: "SUCCESS",
        csv_content: render_csv(&rows),
        filename: format!("{}_{}.csv", file_prefix, Utc::now().format("%Y%m%d_%H%M%S")),
        rows: rows.len(),
        message: "Export completed successfully",
    })
}

pub fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    push_record(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));

    for row in rows {
        let pct = percentage(row.total_scored as i64, row.total_questions as i64);
        push_record(
            &mut out,
            [
                row.score_id.to_string(),
                row.quiz_id.to_string(),
                row.user_id.to_string(),
                row.username.clone(),
                row.full_name.clone().unwrap_or_default(),
                row.subject_id.to_string(),
                row.subject_name.clone(),
                row.chapter_id.to_string(),
                row.chapter_name.clone(),
                row.quiz_name.clone(),
                row.total_scored.to_string(),
                row.total_questions.to_string(),
                format!("{}%", pct),
                row.date_of_quiz
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                row.time_duration.map(format_duration).unwrap_or_default(),
                row.remarks.clone().unwrap_or_default(),
                row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        );
    }

    out
}

/// Minutes as `H:MM:SS`.
fn format_duration(minutes: i32) -> String {
    format!("{}:{:02}:00", minutes / 60, minutes % 60)
}

fn push_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let line = fields
        .into_iter()
        .map(|f| escape_field(&f))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// RFC 4180 quoting: fields containing a comma, quote or line break are quoted
/// and embedded quotes doubled.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
