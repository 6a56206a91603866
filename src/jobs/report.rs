// src/jobs/report.rs

//! Monthly performance report: SQL aggregation, HTML rendering, delivery.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::OnceLock};

use askama::Template;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{FromRow, PgPool};

use crate::{
    error::AppError,
    jobs::{JobContext, Progress},
    mail::{MailFormat, OutgoingMail},
    models::{score::percentage, user::User},
};

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportMonth {
    year: i32,
    month: u32,
}

fn month_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])$").expect("valid month regex"))
}

impl ReportMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The month before the one containing `at`.
    pub fn previous(at: DateTime<Utc>) -> Self {
        if at.month() == 1 {
            Self {
                year: at.year() - 1,
                month: 12,
            }
        } else {
            Self {
                year: at.year(),
                month: at.month() - 1,
            }
        }
    }

    fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.first_day().and_time(NaiveTime::MIN).and_utc()
    }

    /// Exclusive end: midnight on the first day of the next month.
    pub fn end(&self) -> DateTime<Utc> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .unwrap_or_default()
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    /// Human label, e.g. "January 2024".
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }
}

impl fmt::Display for ReportMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportMonth {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::BadRequest("month_year must be formatted YYYY-MM".to_string());
        let caps = month_pattern().captures(s.trim()).ok_or_else(invalid)?;
        let year = caps[1].parse().map_err(|_| invalid())?;
        let month = caps[2].parse().map_err(|_| invalid())?;
        ReportMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for ReportMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReportMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One attempt in the report month with the user's rank among all attempts
/// at the same quiz.
#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub score_id: i64,
    pub quiz_id: i64,
    pub quiz_name: String,
    pub chapter_name: String,
    pub subject_name: String,
    pub total_scored: i32,
    pub total_questions: i32,
    pub timestamp: DateTime<Utc>,
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectStats {
    pub name: String,
    pub quizzes: usize,
    pub total_scored: i64,
    pub total_questions: i64,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptLine {
    pub date: String,
    pub quiz_name: String,
    pub subject_name: String,
    pub chapter_name: String,
    pub total_scored: i32,
    pub total_questions: i32,
    pub percentage: String,
    /// CSS class: score-good (>= 80%), score-average (>= 60%), score-poor.
    pub grade: &'static str,
    pub rank: i64,
}

/// Figures shown in the monthly report.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub user_id: i64,
    pub user_name: String,
    /// "Not specified" when the profile has none.
    pub qualification: String,
    pub username: String,
    pub month: String,
    pub month_label: String,
    pub total_quizzes: usize,
    pub total_questions: i64,
    pub total_scored: i64,
    pub average_score: f64,
    pub subjects: Vec<SubjectStats>,
    pub attempts: Vec<AttemptLine>,
}

fn grade(pct: f64) -> &'static str {
    if pct >= 80.0 {
        "score-good"
    } else if pct >= 60.0 {
        "score-average"
    } else {
        "score-poor"
    }
}

impl MonthlyReport {
    /// Builds the report from attempts already filtered to the month.
    pub fn build(user: &User, month: &ReportMonth, rows: &[ReportRow]) -> Self {
        let total_questions: i64 = rows.iter().map(|r| r.total_questions as i64).sum();
        let total_scored: i64 = rows.iter().map(|r| r.total_scored as i64).sum();

        let mut by_subject: BTreeMap<&str, SubjectStats> = BTreeMap::new();
        for row in rows {
            let stats = by_subject
                .entry(row.subject_name.as_str())
                .or_insert_with(|| SubjectStats {
                    name: row.subject_name.clone(),
                    quizzes: 0,
                    total_scored: 0,
                    total_questions: 0,
                    average: 0.0,
                });
            stats.quizzes += 1;
            stats.total_scored += row.total_scored as i64;
            stats.total_questions += row.total_questions as i64;
        }
        let subjects = by_subject
            .into_values()
            .map(|mut s| {
                s.average = percentage(s.total_scored, s.total_questions);
                s
            })
            .collect();

        let attempts = rows
            .iter()
            .map(|row| {
                let pct = percentage(row.total_scored as i64, row.total_questions as i64);
                AttemptLine {
                    date: row.timestamp.format("%Y-%m-%d").to_string(),
                    quiz_name: row.quiz_name.clone(),
                    subject_name: row.subject_name.clone(),
                    chapter_name: row.chapter_name.clone(),
                    total_scored: row.total_scored,
                    total_questions: row.total_questions,
                    percentage: format!("{:.1}%", pct),
                    grade: grade(pct),
                    rank: row.rank,
                }
            })
            .collect();

        Self {
            user_id: user.id,
            user_name: user.full_name.clone().unwrap_or_else(|| user.username.clone()),
            qualification: user
                .qualification
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .unwrap_or("Not specified")
                .to_string(),
            username: user.username.clone(),
            month: month.to_string(),
            month_label: month.label(),
            total_quizzes: rows.len(),
            total_questions,
            total_scored,
            average_score: percentage(total_scored, total_questions),
            subjects,
            attempts,
        }
    }

    pub fn render_html(&self) -> Result<String, AppError> {
        MonthlyReportPage {
            report: self,
            generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        }
        .render()
        .map_err(|e| AppError::InternalServerError(format!("Report rendering failed: {}", e)))
    }

    pub fn email_subject(&self) -> String {
        format!("Monthly Quiz Report - {}", self.month)
    }
}

#[derive(Template)]
#[template(path = "monthly_report.html")]
struct MonthlyReportPage<'a> {
    report: &'a MonthlyReport,
    generated_at: String,
}

async fn fetch_user(pool: &PgPool, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, full_name, qualification, dob, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

pub async fn fetch_rows(
    pool: &PgPool,
    user_id: i64,
    month: &ReportMonth,
) -> Result<Vec<ReportRow>, AppError> {
    let rows = sqlx::query_as::<_, ReportRow>(
        r#"
        WITH ranked AS (
            SELECT
                s.id, s.quiz_id, s.user_id, s.total_scored, s.total_questions, s.timestamp,
                RANK() OVER (PARTITION BY s.quiz_id ORDER BY s.total_scored DESC) AS rank
            FROM scores s
        )
        SELECT
            r.id AS score_id, r.quiz_id, q.name AS quiz_name,
            c.name AS chapter_name, sub.name AS subject_name,
            r.total_scored, r.total_questions, r.timestamp, r.rank
        FROM ranked r
        JOIN quizzes q ON r.quiz_id = q.id
        JOIN chapters c ON q.chapter_id = c.id
        JOIN subjects sub ON c.subject_id = sub.id
        WHERE r.user_id = $1 AND r.timestamp >= $2 AND r.timestamp < $3
        ORDER BY r.timestamp DESC
        "#,
    )
    .bind(user_id)
    .bind(month.start())
    .bind(month.end())
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch report rows: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(rows)
}

/// Loads the user's month and builds the report.
pub async fn generate(
    pool: &PgPool,
    user_id: i64,
    month: &ReportMonth,
) -> Result<MonthlyReport, AppError> {
    let user = fetch_user(pool, user_id).await?;
    let rows = fetch_rows(pool, user_id, month).await?;
    tracing::info!(user_id, %month, attempts = rows.len(), "Monthly report generated");
    Ok(MonthlyReport::build(&user, month, &rows))
}

#[derive(Debug, Serialize)]
pub struct ReportDelivery {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub month_year: String,
    pub total_quizzes: usize,
    pub status: &'static str,
}

/// Generates the report and mails it to `email`, or to the username.
pub async fn generate_and_send(
    ctx: &JobContext,
    user_id: i64,
    month: &ReportMonth,
    email: Option<String>,
) -> Result<ReportDelivery, AppError> {
    let report = generate(&ctx.pool, user_id, month).await?;
    let html = report.render_html()?;
    let to = email.unwrap_or_else(|| report.username.clone());

    ctx.mailer
        .send(OutgoingMail {
            to: to.clone(),
            subject: report.email_subject(),
            body: html,
            format: MailFormat::Html,
        })
        .await?;

    Ok(ReportDelivery {
        user_id,
        username: report.username,
        email: to,
        month_year: month.to_string(),
        total_quizzes: report.total_quizzes,
        status: "sent",
    })
}

#[derive(Debug, Serialize)]
pub struct UserReportResult {
    pub user_id: i64,
    pub username: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total_users: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub message: String,
    pub month_year: String,
    pub summary: BatchSummary,
    pub results: Vec<UserReportResult>,
}

pub fn summarize(month: &ReportMonth, results: Vec<UserReportResult>) -> BatchResult {
    let total_users = results.len();
    let successful = results.iter().filter(|r| r.success).count();

    BatchResult {
        message: format!("Completed report generation for {} users", total_users),
        month_year: month.to_string(),
        summary: BatchSummary {
            total_users,
            successful,
            failed: total_users - successful,
            success_rate: percentage(successful as i64, total_users as i64),
        },
        results,
    }
}

/// Sends every user their report. One user's failure does not stop the batch.
pub async fn process_all(
    ctx: &JobContext,
    month: &ReportMonth,
    progress: &Progress,
) -> Result<BatchResult, AppError> {
    let users: Vec<(i64, String)> = sqlx::query_as("SELECT id, username FROM users ORDER BY id")
        .fetch_all(&ctx.pool)
        .await?;
    let total = users.len();
    tracing::info!(%month, total, "Starting monthly reports for all users");

    let mut results = Vec::with_capacity(total);
    for (i, (user_id, username)) in users.into_iter().enumerate() {
        progress
            .update(
                format!("Processing user {} ({}/{})", username, i + 1, total),
                i + 1,
                total,
            )
            .await;

        let result = match generate_and_send(ctx, user_id, month, None).await {
            Ok(_) => UserReportResult {
                user_id,
                username,
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(user_id, "Monthly report failed: {}", e);
                UserReportResult {
                    user_id,
                    username,
                    success: false,
                    error: Some(e.message().to_string()),
                }
            }
        };
        results.push(result);
    }

    Ok(summarize(month, results))
}
