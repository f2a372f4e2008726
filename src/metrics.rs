use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    approvals: AtomicU64,
}

impl Metrics {
    pub fn count_requests(&self, sent: u64) {
        self.requests.fetch_add(sent, Ordering::Relaxed);
    }

    pub fn count_approval(&self) {
        self.approvals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn approvals(&self) -> u64 {
        self.approvals.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub algorithm: String,
    pub accounts: usize,
    pub transactions: usize,
    pub requests: u64,
    pub approvals: u64,
    pub total_messages: u64,
    pub duration_ms: u64,
}

impl MetricsReport {
    pub fn new(
        label: &str,
        accounts: usize,
        transactions: usize,
        metrics: &Metrics,
        duration: Duration,
    ) -> Self {
        let requests = metrics.requests();
        let approvals = metrics.approvals();
        Self {
            algorithm: label.to_string(),
            accounts,
            transactions,
            requests,
            approvals,
            total_messages: requests + approvals,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn to_json_string(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
        std::fs::write(path, self.to_json_string()? + "\n")?;
        Ok(())
    }
}
