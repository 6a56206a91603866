// src/config.rs

use std::env;

use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::error::AppError;

/// Default token lifetime: two hours.
pub const DEFAULT_JWT_EXPIRATION: u64 = 2 * 60 * 60;

/// Default expiry for cached list and summary responses.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Outbound mail settings. Absent when `SMTP_HOST` is not set.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// When the background scheduler fires its recurring jobs (UTC).
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub reminder_time: NaiveTime,
    pub monthly_report_day: u32,
    pub monthly_report_time: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reminder_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            monthly_report_day: 1,
            monthly_report_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub cache_ttl_secs: u64,
    pub cors_origins: Vec<String>,
    pub smtp: Option<SmtpConfig>,
    pub schedule: ScheduleConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cache_ttl_secs = parsed("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:5173".to_string(),
                ]
            });

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => {
                let username = env::var("SMTP_USERNAME").unwrap_or_default();
                Some(SmtpConfig {
                    host,
                    port: parsed("SMTP_PORT", 587u16)?,
                    from: env::var("SMTP_FROM").unwrap_or_else(|_| username.clone()),
                    username,
                    password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                })
            }
            _ => None,
        };

        let schedule = ScheduleConfig {
            enabled: parsed("SCHEDULER_ENABLED", true)?,
            reminder_time: time_of_day("REMINDER_TIME", "18:00")?,
            monthly_report_day: parsed("MONTHLY_REPORT_DAY", 1u32)?,
            monthly_report_time: time_of_day("MONTHLY_REPORT_TIME", "08:00")?,
        };

        if !(1..=28).contains(&schedule.monthly_report_day) {
            return Err(AppError::InternalServerError(
                "MONTHLY_REPORT_DAY must be between 1 and 28".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            cache_ttl_secs,
            cors_origins,
            smtp,
            schedule,
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::InternalServerError(format!("{} must be set", key)))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{} has an invalid value", key))),
        Err(_) => Ok(default),
    }
}

fn time_of_day(key: &str, default: &str) -> Result<NaiveTime, AppError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_time_of_day(&raw)
        .ok_or_else(|| AppError::InternalServerError(format!("{} must be HH:MM", key)))
}

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_of_day() {
        assert_eq!(
            parse_time_of_day("21:51"),
            NaiveTime::from_hms_opt(21, 51, 0)
        );
        assert_eq!(parse_time_of_day(" 08:00 "), NaiveTime::from_hms_opt(8, 0, 0));
        assert!(parse_time_of_day("25:00").is_none());
        assert!(parse_time_of_day("noon").is_none());
    }

    #[test]
    fn splits_origin_list() {
        assert_eq!(
            parse_list("http://a.test, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
