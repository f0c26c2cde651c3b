use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "studio.timing";

#[derive(Debug)]
pub struct RequestTimer {
    endpoint: String,
    detail_in: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl RequestTimer {
    pub fn new(endpoint: &str, detail_in: Option<String>) -> Self {
        RequestTimer {
            endpoint: endpoint.to_string(),
            detail_in: detail_in.map(|value| {
                let value = value.replace('\n', " ");
                if value.chars().count() > 300 {
                    value.chars().take(300).collect()
                } else {
                    value
                }
            }),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=request_received endpoint={} received_at={} input={:?}",
            self.endpoint,
            self.started_at.to_rfc3339(),
            self.detail_in
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed endpoint={} started_at={} response_sent_at={} duration_s={:.3} status={} detail={}",
            self.endpoint,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.log_completed();
    }
}

pub fn start_request_timer(endpoint: &str, detail_in: Option<String>) -> RequestTimer {
    let timer = RequestTimer::new(endpoint, detail_in);
    timer.log_received();
    timer
}

/// Closes the timer with the outcome of `result` and hands the result back.
pub fn complete_request_timer<T, E: std::fmt::Display>(
    timer: &mut RequestTimer,
    result: Result<T, E>,
) -> Result<T, E> {
    match &result {
        Ok(_) => timer.mark_status("success", None),
        Err(err) => timer.mark_status("error", Some(err.to_string())),
    }
    timer.log_completed();
    result
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_err() { "error" } else { "success" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_twice_only_logs_once() {
        let mut timer = RequestTimer::new("generate-one-image", Some("a\nfox".to_string()));
        assert_eq!(timer.detail_in.as_deref(), Some("a fox"));
        let result: Result<(), String> =
            complete_request_timer(&mut timer, Err("boom".to_string()));
        assert!(result.is_err());
        assert!(timer.completed);
        assert_eq!(timer.status, "error");
        timer.log_completed();
        assert_eq!(timer.detail.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn llm_timing_passes_results_through() {
        let value: Result<u8, String> =
            log_llm_timing("gemini", "model", "op", None, || async { Ok(3) }).await;
        assert_eq!(value, Ok(3));
    }
}
