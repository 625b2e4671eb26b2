use crate::StubConfig;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<StubConfig>,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: StubConfig) -> Self {
        Self {
            config: Arc::new(config),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
