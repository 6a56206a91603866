// src/jobs/reminder.rs

//! Daily "new quizzes" reminder mail.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::{
    error::AppError,
    jobs::JobContext,
    mail::{MailFormat, OutgoingMail},
};

#[derive(Debug, Clone, FromRow)]
pub struct NewQuiz {
    pub id: i64,
    pub name: String,
    pub chapter_name: String,
    pub subject_name: String,
}

#[derive(Debug, Serialize)]
pub struct ReminderOutcome {
    pub message: String,
    pub quizzes_count: usize,
    pub total_users: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Subject and plain-text body announcing `quizzes`.
pub fn compose(quizzes: &[NewQuiz]) -> (String, String) {
    let count = quizzes.len();
    let plural = count > 1;

    let subject = format!(
        "Daily Quiz Reminder - {} New Quiz{} Available",
        count,
        if plural { "zes" } else { "" }
    );

    let list = quizzes
        .iter()
        .map(|q| format!("- {} ({} - {})", q.name, q.subject_name, q.chapter_name))
        .collect::<Vec<_>>()
        .join("\n");

    let body = format!(
        "Daily Quiz Reminder\n\n\
         {} new quiz{} {} been added today:\n\n\
         {}\n\n\
         Best regards,\nQuiz Master Team",
        count,
        if plural { "zes" } else { "" },
        if plural { "have" } else { "has" },
        list
    );

    (subject, body)
}

/// Mails every non-admin user the quizzes created on the UTC day of `now`.
pub async fn send_daily(ctx: &JobContext, now: DateTime<Utc>) -> Result<ReminderOutcome, AppError> {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + chrono::Duration::days(1);

    let quizzes = sqlx::query_as::<_, NewQuiz>(
        r#"
        SELECT q.id, q.name, c.name AS chapter_name, s.name AS subject_name
        FROM quizzes q
        JOIN chapters c ON q.chapter_id = c.id
        JOIN subjects s ON c.subject_id = s.id
        WHERE q.created_at >= $1 AND q.created_at < $2
        ORDER BY q.created_at
        "#,
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_all(&ctx.pool)
    .await?;

    if quizzes.is_empty() {
        tracing::info!("No new quizzes today, skipping reminders");
        return Ok(ReminderOutcome {
            message: "No new quizzes found today".to_string(),
            quizzes_count: 0,
            total_users: 0,
            success_count: 0,
            failure_count: 0,
        });
    }

    let recipients: Vec<(String,)> =
        sqlx::query_as("SELECT username FROM users WHERE role <> 'admin' ORDER BY id")
            .fetch_all(&ctx.pool)
            .await?;

    let (subject, body) = compose(&quizzes);
    let mut success_count = 0;
    let mut failure_count = 0;

    for (username,) in &recipients {
        let sent = ctx
            .mailer
            .send(OutgoingMail {
                to: username.clone(),
                subject: subject.clone(),
                body: body.clone(),
                format: MailFormat::Text,
            })
            .await;

        match sent {
            Ok(()) => success_count += 1,
            Err(e) => {
                failure_count += 1;
                tracing::warn!("Reminder to {} failed: {}", username, e.message());
            }
        }
    }

    tracing::info!(success_count, failure_count, "Daily reminders completed");

    Ok(ReminderOutcome {
        message: format!("Daily reminders sent to {} users", recipients.len()),
        quizzes_count: quizzes.len(),
        total_users: recipients.len(),
        success_count,
        failure_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(name: &str) -> NewQuiz {
        NewQuiz {
            id: 1,
            name: name.into(),
            chapter_name: "Algebra".into(),
            subject_name: "Maths".into(),
        }
    }

    #[test]
    fn single_quiz_wording() {
        let (subject, body) = compose(&[quiz("Weekly test")]);
        assert_eq!(subject, "Daily Quiz Reminder - 1 New Quiz Available");
        assert!(body.contains("1 new quiz has been added today"));
        assert!(body.contains("- Weekly test (Maths - Algebra)"));
    }

    #[test]
    fn plural_wording() {
        let (subject, body) = compose(&[quiz("A"), quiz("B")]);
        assert_eq!(subject, "Daily Quiz Reminder - 2 New Quizzes Available");
        assert!(body.contains("2 new quizzes have been added today"));
    }
}
