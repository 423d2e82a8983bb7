//! Asynchronous batch job lifecycle: create, poll, fetch results, cancel, list
//! and the bounded wait-for-completion loop.
//!
//! The job state lives on the server; everything held here is local to a
//! single operation call.

use crate::api_client::{ApiClient, ApiRequest};
use crate::classifier::enrich_at;
use crate::email_parser::dedupe;
use crate::errors::AppError;
use crate::models::{BatchStatistics, EnrichedResult, JobState, Priority, ValidationRecord};
use crate::statistics::{aggregate, round2};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Maximum number of emails accepted by a single job.
pub const MAX_JOB_EMAILS: usize = 10_000;
/// Maximum page size accepted by the results endpoint.
pub const MAX_PAGE_SIZE: u32 = 1_000;
/// Lower bound for the completion estimate, in seconds.
pub const MIN_ESTIMATE_SECS: u64 = 30;
const SMTP_COST_MS: u64 = 2_000;
const BASIC_COST_MS: u64 = 800;

/// Estimated processing time in seconds for `email_count` emails.
pub fn estimate_completion(email_count: usize, priority: Priority, check_smtp: bool) -> u64 {
    let per_email_ms = if check_smtp { SMTP_COST_MS } else { BASIC_COST_MS };
    // multiplier expressed in percent to keep the arithmetic integral
    let multiplier_pct: u64 = match priority {
        Priority::High => 50,
        Priority::Normal => 100,
        Priority::Low => 150,
    };
    let scaled = email_count as u64 * per_email_ms * multiplier_pct;
    scaled.div_ceil(100_000).max(MIN_ESTIMATE_SECS)
}

fn require_job_id(job_id: &str) -> Result<&str, AppError> {
    let trimmed = job_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Job ID is required".to_string()));
    }
    Ok(trimmed)
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

/// Parses every element of `values` into an enriched result.
pub(crate) fn enrich_values(
    values: Vec<Value>,
    validated_at: DateTime<Utc>,
) -> Result<Vec<EnrichedResult>, AppError> {
    values
        .into_iter()
        .map(|value| {
            let record: ValidationRecord = serde_json::from_value(value)?;
            Ok(enrich_at(record, validated_at))
        })
        .collect()
}

/// Options for [`JobController::create_job`].
#[derive(Debug, Clone, Default)]
pub struct CreateJobOptions {
    pub check_smtp: bool,
    pub priority: Priority,
    pub callback_url: Option<String>,
    pub batch_name: Option<String>,
    pub deduplicate: bool,
}

/// Server job status decorated with convenience flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusReport {
    #[serde(flatten)]
    pub server: Map<String, Value>,
    pub is_completed: bool,
    pub is_failed: bool,
    pub is_processing: bool,
    pub is_cancelled: bool,
    pub progress_percent: f64,
}

impl JobStatusReport {
    pub fn from_server(server: Map<String, Value>) -> Self {
        let state = JobState::parse(server.get("status").and_then(Value::as_str).unwrap_or(""));
        let progress_percent = Self::progress(&server);
        Self {
            is_completed: state == JobState::Completed,
            is_failed: state == JobState::Failed,
            is_processing: matches!(state, JobState::Pending | JobState::Processing),
            is_cancelled: state == JobState::Cancelled,
            progress_percent,
            server,
        }
    }

    fn progress(server: &Map<String, Value>) -> f64 {
        let processed = server.get("processed").and_then(Value::as_f64);
        let total = server.get("total_emails").and_then(Value::as_f64);
        match (processed, total) {
            (Some(processed), Some(total)) if total > 0.0 => round2(processed / total * 100.0),
            _ => server
                .get("progress")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        }
    }

    pub fn status(&self) -> &str {
        self.server
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    pub fn state(&self) -> JobState {
        JobState::parse(self.status())
    }

    /// Server-reported failure reason, if any.
    pub fn error_message(&self) -> String {
        ["error", "error_message", "message"]
            .iter()
            .find_map(|key| self.server.get(*key).and_then(Value::as_str))
            .unwrap_or("Job failed without an error message")
            .to_string()
    }
}

/// One page of enriched job results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsPage {
    #[serde(flatten)]
    pub server: Map<String, Value>,
    pub results: Vec<EnrichedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BatchStatistics>,
}

/// Parameters of [`JobController::get_results`].
#[derive(Debug, Clone)]
pub struct ResultsQuery {
    pub page: u32,
    pub page_size: u32,
    pub status_filter: Option<String>,
    pub include_statistics: bool,
}

impl Default for ResultsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 100,
            status_filter: None,
            include_statistics: false,
        }
    }
}

/// Parameters of [`JobController::wait_for_completion`].
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub max_wait: Duration,
    pub poll_interval: Duration,
    pub fetch_results: bool,
    pub include_statistics: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
            fetch_results: true,
            include_statistics: true,
        }
    }
}

/// Successful end of a wait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedJob {
    #[serde(flatten)]
    pub status: JobStatusReport,
    pub wait_time_seconds: f64,
    pub poll_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<EnrichedResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BatchStatistics>,
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Completed(Box<CompletedJob>),
    Failed {
        job_id: String,
        message: String,
        status: Box<JobStatusReport>,
        elapsed: Duration,
    },
    Cancelled {
        job_id: String,
        status: Box<JobStatusReport>,
        elapsed: Duration,
    },
    TimedOut {
        job_id: String,
        last_status: Option<String>,
        elapsed: Duration,
        poll_count: u32,
    },
}

impl WaitOutcome {
    pub fn into_result(self) -> Result<CompletedJob, AppError> {
        match self {
            WaitOutcome::Completed(job) => Ok(*job),
            WaitOutcome::Failed {
                job_id,
                message,
                status,
                elapsed,
            } => Err(AppError::JobFailed {
                job_id,
                message,
                last_status: status.status().to_string(),
                elapsed,
            }),
            WaitOutcome::Cancelled {
                job_id,
                status,
                elapsed,
            } => Err(AppError::JobCancelled {
                job_id,
                last_status: status.status().to_string(),
                elapsed,
            }),
            WaitOutcome::TimedOut {
                job_id,
                last_status,
                elapsed,
                ..
            } => Err(AppError::JobTimeout {
                job_id,
                last_status: last_status.unwrap_or_else(|| "unknown".to_string()),
                elapsed,
            }),
        }
    }
}

/// Drives batch jobs through the validation API.
#[derive(Clone)]
pub struct JobController {
    api: ApiClient,
}

impl JobController {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Submits `emails` as a new job.
    ///
    /// Fails with `InvalidInput` before any network call when the list is empty
    /// or larger than [`MAX_JOB_EMAILS`].
    pub async fn create_job(
        &self,
        emails: Vec<String>,
        options: &CreateJobOptions,
    ) -> Result<Value, AppError> {
        let total_submitted = emails.len();
        let (emails, duplicates_removed) = if options.deduplicate {
            dedupe(emails)
        } else {
            (emails, 0)
        };

        if emails.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one valid email address is required".to_string(),
            ));
        }
        if emails.len() > MAX_JOB_EMAILS {
            return Err(AppError::InvalidInput(format!(
                "Batch jobs accept at most {} emails, got {}",
                MAX_JOB_EMAILS,
                emails.len()
            )));
        }

        let total_unique = emails.len();
        let mut body = json!({
            "emails": emails,
            "check_smtp": options.check_smtp,
            "priority": options.priority.as_str(),
        });
        if let Some(url) = &options.callback_url {
            body["callback_url"] = json!(url);
        }
        if let Some(name) = &options.batch_name {
            body["batch_name"] = json!(name);
        }

        tracing::info!(
            "Creating validation job: {} emails ({} duplicates removed), priority {}",
            total_unique,
            duplicates_removed,
            options.priority.as_str()
        );
        let response = self
            .api
            .call("Create job", ApiRequest::post("/jobs", Some(body)))
            .await?;

        let submitted_at = self.api.clock().utc_now();
        let estimate = estimate_completion(total_unique, options.priority, options.check_smtp);
        let estimated_completion = submitted_at + chrono::Duration::seconds(estimate as i64);

        let mut job = into_object(response);
        job.insert("total_submitted".to_string(), json!(total_submitted));
        job.insert("total_unique".to_string(), json!(total_unique));
        job.insert("duplicates_removed".to_string(), json!(duplicates_removed));
        job.insert("submitted_at".to_string(), json!(submitted_at));
        job.insert("estimated_completion".to_string(), json!(estimated_completion));
        job.insert("estimated_seconds".to_string(), json!(estimate));

        if let Some(id) = job.get("job_id").or_else(|| job.get("id")) {
            tracing::info!("✓ Job created: {}", id);
        }
        Ok(Value::Object(job))
    }

    /// Fetches the server status of a job and decorates it with state flags.
    ///
    /// # Arguments
    ///
    /// * `job_id` - Job identifier returned by [`JobController::create_job`].
    ///
    /// # Returns
    ///
    /// * `Result<JobStatusReport, AppError>` - Server fields plus `is_*` flags and
    ///   `progress_percent`, or `InvalidInput` for a blank ID.
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatusReport, AppError> {
        let job_id = require_job_id(job_id)?;
        let response = self
            .api
            .call("Get job status", ApiRequest::get(format!("/jobs/{}", job_id)))
            .await?;
        Ok(JobStatusReport::from_server(into_object(response)))
    }

    /// Fetches one page of results and enriches every record.
    pub async fn get_results(
        &self,
        job_id: &str,
        query: &ResultsQuery,
    ) -> Result<ResultsPage, AppError> {
        let job_id = require_job_id(job_id)?;
        if query.page == 0 {
            return Err(AppError::InvalidInput("Page numbers start at 1".to_string()));
        }
        if query.page_size == 0 || query.page_size > MAX_PAGE_SIZE {
            return Err(AppError::InvalidInput(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let mut request = ApiRequest::get(format!("/jobs/{}/results", job_id))
            .query("page", query.page)
            .query("page_size", query.page_size);
        if let Some(status) = query.status_filter.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("status", status);
        }

        let response = self.api.call("Get job results", request).await?;
        let (server, raw_results) = match response {
            Value::Array(items) => (Map::new(), items),
            other => {
                let mut server = into_object(other);
                let items = match server.remove("results") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                (server, items)
            }
        };

        let results = enrich_values(raw_results, self.api.clock().utc_now())?;
        tracing::debug!("Enriched {} results for job {}", results.len(), job_id);
        let statistics = query.include_statistics.then(|| aggregate(&results));

        Ok(ResultsPage {
            server,
            results,
            statistics,
        })
    }

    /// Requests cancellation of a job.
    ///
    /// # Arguments
    ///
    /// * `job_id` - Job to cancel.
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - Server confirmation with `job_id` and
    ///   `cancelled_at` added.
    pub async fn cancel_job(&self, job_id: &str) -> Result<Value, AppError> {
        let job_id = require_job_id(job_id)?;
        tracing::info!("Cancelling job {}", job_id);
        let response = self
            .api
            .call(
                "Cancel job",
                ApiRequest::post(format!("/jobs/{}/cancel", job_id), None),
            )
            .await?;

        let mut confirmation = into_object(response);
        confirmation
            .entry("job_id")
            .or_insert_with(|| json!(job_id));
        confirmation.insert(
            "cancelled_at".to_string(),
            json!(self.api.clock().utc_now()),
        );
        Ok(Value::Object(confirmation))
    }

    /// Lists recent jobs, optionally filtered by status. Each entry gains
    /// `is_completed` and `is_processing`.
    pub async fn list_jobs(
        &self,
        limit: u32,
        status_filter: Option<&str>,
    ) -> Result<Vec<Value>, AppError> {
        let mut request = ApiRequest::get("/jobs").query("limit", limit);
        if let Some(status) = status_filter.filter(|s| !s.is_empty()) {
            request = request.query("status", status);
        }

        let response = self.api.call("List jobs", request).await?;
        let jobs = match response {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("jobs") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        Ok(jobs
            .into_iter()
            .map(|job| {
                let mut job = into_object(job);
                let state =
                    JobState::parse(job.get("status").and_then(Value::as_str).unwrap_or(""));
                job.insert(
                    "is_completed".to_string(),
                    json!(state == JobState::Completed),
                );
                job.insert(
                    "is_processing".to_string(),
                    json!(matches!(state, JobState::Pending | JobState::Processing)),
                );
                Value::Object(job)
            })
            .collect())
    }

    /// Polls `job_id` until it reaches a terminal state or `max_wait` elapses.
    ///
    /// Sleeps on the injected clock between polls. Failed and cancelled jobs end
    /// the wait immediately without further polling.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        options: &WaitOptions,
    ) -> Result<WaitOutcome, AppError> {
        let job_id = require_job_id(job_id)?.to_string();
        let clock = self.api.clock().clone();
        let started = clock.now();
        let mut poll_count = 0u32;
        let mut last_status: Option<String> = None;

        tracing::info!(
            "Waiting for job {} (max {:?}, polling every {:?})",
            job_id,
            options.max_wait,
            options.poll_interval
        );

        while clock.now() - started < options.max_wait {
            let status = self.get_status(&job_id).await?;
            poll_count += 1;
            let elapsed = clock.now() - started;

            match status.state() {
                JobState::Completed => {
                    tracing::info!(
                        "✓ Job {} completed after {} polls ({:?})",
                        job_id,
                        poll_count,
                        elapsed
                    );
                    let (results, statistics) = if options.fetch_results {
                        let page = self
                            .get_results(
                                &job_id,
                                &ResultsQuery {
                                    include_statistics: options.include_statistics,
                                    ..ResultsQuery::default()
                                },
                            )
                            .await?;
                        (Some(page.results), page.statistics)
                    } else {
                        (None, None)
                    };

                    return Ok(WaitOutcome::Completed(Box::new(CompletedJob {
                        status,
                        wait_time_seconds: round2(elapsed.as_secs_f64()),
                        poll_count,
                        results,
                        statistics,
                    })));
                }
                JobState::Failed => {
                    let message = status.error_message();
                    tracing::warn!("Job {} failed: {}", job_id, message);
                    return Ok(WaitOutcome::Failed {
                        job_id,
                        message,
                        status: Box::new(status),
                        elapsed,
                    });
                }
                JobState::Cancelled => {
                    tracing::warn!("Job {} was cancelled", job_id);
                    return Ok(WaitOutcome::Cancelled {
                        job_id,
                        status: Box::new(status),
                        elapsed,
                    });
                }
                state => {
                    tracing::debug!(
                        "Job {} is {:?} ({}%), poll {}",
                        job_id,
                        state,
                        status.progress_percent,
                        poll_count
                    );
                    last_status = Some(status.status().to_string());
                    clock.sleep(options.poll_interval).await;
                }
            }
        }

        let elapsed = clock.now() - started;
        tracing::warn!(
            "Timed out waiting for job {} after {:?} ({} polls)",
            job_id,
            elapsed,
            poll_count
        );
        Ok(WaitOutcome::TimedOut {
            job_id,
            last_status,
            elapsed,
            poll_count,
        })
    }
}
