//! Dispatch of (resource, operation) pairs to the services, one item at a time.

use crate::api_client::ApiClient;
use crate::email_parser::{parse_email_list, parse_emails};
use crate::errors::AppError;
use crate::jobs::{CreateJobOptions, JobController, ResultsQuery, WaitOptions};
use crate::models::{OneOrMany, Priority};
use crate::services::{AccountService, ValidationService};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Supported (resource, operation) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ValidateEmail,
    ValidateBatch,
    CreateJob,
    GetJobStatus,
    GetJobResults,
    CancelJob,
    ListJobs,
    WaitForCompletion,
    GetUsage,
    GetPlan,
}

impl Operation {
    pub fn resolve(resource: &str, operation: &str) -> Result<Self, AppError> {
        let op = match (resource, operation) {
            ("email", "validate") => Operation::ValidateEmail,
            ("email", "validateBatch") => Operation::ValidateBatch,
            ("job", "create") => Operation::CreateJob,
            ("job", "getStatus") => Operation::GetJobStatus,
            ("job", "getResults") => Operation::GetJobResults,
            ("job", "cancel") => Operation::CancelJob,
            ("job", "list") => Operation::ListJobs,
            ("job", "waitForCompletion") => Operation::WaitForCompletion,
            ("account", "getUsage") => Operation::GetUsage,
            ("account", "getPlan") => Operation::GetPlan,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "Unsupported operation '{}' for resource '{}'",
                    operation, resource
                )))
            }
        };
        Ok(op)
    }
}

/// Parameters of one input item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeParameters(pub Map<String, Value>);

impl NodeParameters {
    pub fn required_str(&self, name: &str) -> Result<String, AppError> {
        self.optional_str(name)
            .ok_or_else(|| AppError::InvalidInput(format!("Parameter '{}' is required", name)))
    }

    /// String parameter; empty strings count as absent.
    pub fn optional_str(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.0.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => default,
            },
            _ => default,
        }
    }

    pub fn u64_or(&self, name: &str, default: u64) -> Result<u64, AppError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
                AppError::InvalidInput(format!("Parameter '{}' must be a non-negative integer", name))
            }),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(default),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| {
                AppError::InvalidInput(format!("Parameter '{}' must be a non-negative integer", name))
            }),
            Some(_) => Err(AppError::InvalidInput(format!(
                "Parameter '{}' must be a non-negative integer",
                name
            ))),
        }
    }

    fn u32_or(&self, name: &str, default: u32) -> Result<u32, AppError> {
        let value = self.u64_or(name, u64::from(default))?;
        u32::try_from(value)
            .map_err(|_| AppError::InvalidInput(format!("Parameter '{}' is too large", name)))
    }

    /// Emails from a free-text string or a list of strings, normalized.
    pub fn email_list(&self, name: &str) -> Result<Vec<String>, AppError> {
        match self.0.get(name) {
            Some(Value::String(text)) => Ok(parse_emails(text)),
            Some(Value::Array(items)) => {
                let entries: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                Ok(parse_email_list(&entries))
            }
            None | Some(Value::Null) => Err(AppError::InvalidInput(format!(
                "Parameter '{}' is required",
                name
            ))),
            Some(_) => Err(AppError::InvalidInput(format!(
                "Parameter '{}' must be a string or a list of strings",
                name
            ))),
        }
    }
}

/// An execution request from the workflow host.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub resource: String,
    pub operation: String,
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub items: Vec<NodeParameters>,
}

/// Routes each input item to the matching service.
#[derive(Clone)]
pub struct NodeRouter {
    validation: ValidationService,
    accounts: AccountService,
    jobs: JobController,
}

impl NodeRouter {
    pub fn new(api: ApiClient) -> Self {
        Self {
            validation: ValidationService::new(api.clone()),
            accounts: AccountService::new(api.clone()),
            jobs: JobController::new(api),
        }
    }

    /// Runs the operation for every item in order.
    ///
    /// With `continue_on_fail`, a failing item becomes an error record and the
    /// next item is processed; otherwise the first error aborts the run.
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<Vec<Value>, AppError> {
        let operation = Operation::resolve(&request.resource, &request.operation)?;
        // operations without parameters still run once
        let default_item = [NodeParameters::default()];
        let items: &[NodeParameters] = if request.items.is_empty() {
            &default_item
        } else {
            &request.items
        };

        let mut output = Vec::new();
        for (index, params) in items.iter().enumerate() {
            match self.run_item(operation, params).await {
                Ok(result) => output.extend(result.into_vec()),
                Err(err) if request.continue_on_fail => {
                    tracing::warn!(
                        "Item {} failed ({}.{}), continuing: {}",
                        index,
                        request.resource,
                        request.operation,
                        err
                    );
                    output.push(json!({
                        "error": err.to_string(),
                        "error_code": err.error_code(),
                        "retryable": err.is_retryable(),
                        "success": false,
                        "item_index": index,
                        "resource": request.resource,
                        "operation": request.operation,
                    }));
                }
                Err(err) => {
                    tracing::error!("Item {} failed, aborting run: {}", index, err);
                    return Err(err);
                }
            }
        }
        Ok(output)
    }

    async fn run_item(
        &self,
        operation: Operation,
        params: &NodeParameters,
    ) -> Result<OneOrMany<Value>, AppError> {
        match operation {
            Operation::ValidateEmail => {
                let result = self
                    .validation
                    .validate_one(
                        &params.required_str("email")?,
                        params.bool_or("check_smtp", false),
                        params.bool_or("include_raw_dns", false),
                    )
                    .await?;
                Ok(OneOrMany::One(serde_json::to_value(result)?))
            }
            Operation::ValidateBatch => {
                let include_statistics = params.bool_or("include_statistics", false);
                let batch = self
                    .validation
                    .validate_many(
                        params.email_list("emails")?,
                        params.bool_or("check_smtp", false),
                        include_statistics,
                    )
                    .await?;
                if include_statistics {
                    Ok(OneOrMany::One(serde_json::to_value(batch)?))
                } else {
                    batch
                        .results
                        .into_iter()
                        .map(serde_json::to_value)
                        .collect::<Result<Vec<_>, _>>()
                        .map(OneOrMany::Many)
                        .map_err(AppError::from)
                }
            }
            Operation::CreateJob => {
                let priority_raw = params
                    .optional_str("priority")
                    .unwrap_or_else(|| "normal".to_string());
                let priority = Priority::parse(&priority_raw).ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "Priority must be high, normal or low, got '{}'",
                        priority_raw
                    ))
                })?;
                let options = CreateJobOptions {
                    check_smtp: params.bool_or("check_smtp", false),
                    priority,
                    callback_url: params.optional_str("callback_url"),
                    batch_name: params.optional_str("batch_name"),
                    deduplicate: params.bool_or("deduplicate", true),
                };
                let job = self
                    .jobs
                    .create_job(params.email_list("emails")?, &options)
                    .await?;
                Ok(OneOrMany::One(job))
            }
            Operation::GetJobStatus => {
                let status = self.jobs.get_status(&params.required_str("job_id")?).await?;
                Ok(OneOrMany::One(serde_json::to_value(status)?))
            }
            Operation::GetJobResults => {
                let query = ResultsQuery {
                    page: params.u32_or("page", 1)?,
                    page_size: params.u32_or("page_size", 100)?,
                    status_filter: params.optional_str("status_filter"),
                    include_statistics: params.bool_or("include_statistics", false),
                };
                let page = self
                    .jobs
                    .get_results(&params.required_str("job_id")?, &query)
                    .await?;
                if params.bool_or("split_results", false) {
                    page.results
                        .into_iter()
                        .map(serde_json::to_value)
                        .collect::<Result<Vec<_>, _>>()
                        .map(OneOrMany::Many)
                        .map_err(AppError::from)
                } else {
                    Ok(OneOrMany::One(serde_json::to_value(page)?))
                }
            }
            Operation::CancelJob => {
                let confirmation = self.jobs.cancel_job(&params.required_str("job_id")?).await?;
                Ok(OneOrMany::One(confirmation))
            }
            Operation::ListJobs => {
                let limit = params.u32_or("limit", 50)?;
                let status = params.optional_str("status_filter");
                let jobs = self.jobs.list_jobs(limit, status.as_deref()).await?;
                Ok(OneOrMany::Many(jobs))
            }
            Operation::WaitForCompletion => {
                let options = WaitOptions {
                    max_wait: Duration::from_secs(params.u64_or("max_wait_seconds", 300)?),
                    poll_interval: Duration::from_secs(
                        params.u64_or("poll_interval_seconds", 10)?.max(1),
                    ),
                    fetch_results: params.bool_or("fetch_results", true),
                    include_statistics: params.bool_or("include_statistics", true),
                };
                let completed = self
                    .jobs
                    .wait_for_completion(&params.required_str("job_id")?, &options)
                    .await?
                    .into_result()?;
                Ok(OneOrMany::One(serde_json::to_value(completed)?))
            }
            Operation::GetUsage => Ok(OneOrMany::One(self.accounts.usage().await?)),
            Operation::GetPlan => Ok(OneOrMany::One(self.accounts.plan().await?)),
        }
    }
}
