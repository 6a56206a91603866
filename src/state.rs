// src/state.rs

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    cache::Cache,
    config::Config,
    jobs::{JobContext, JobQueue},
    mail::Mailer,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: Cache,
    pub jobs: JobQueue,
}

impl AppState {
    /// Builds the shared state and starts the background job worker.
    /// Must be called from within a Tokio runtime.
    pub fn new(pool: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let cache = Cache::new(Duration::from_secs(config.cache_ttl_secs));
        let jobs = JobQueue::start(JobContext {
            pool: pool.clone(),
            mailer,
        });

        Self {
            pool,
            config,
            cache,
            jobs,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Cache {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for JobQueue {
    fn from_ref(state: &AppState) -> Self {
        state.jobs.clone()
    }
}
