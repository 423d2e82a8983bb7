use crate::api_client::{ApiClient, ApiRequest};
use crate::classifier::enrich_at;
use crate::email_parser::{dedupe, is_valid_email};
use crate::errors::AppError;
use crate::jobs::enrich_values;
use crate::models::{BatchStatistics, EnrichedResult, ValidationRecord};
use crate::statistics::aggregate;
use serde::Serialize;
use serde_json::{json, Value};

/// Maximum number of emails accepted by the synchronous batch endpoint.
pub const MAX_SYNC_BATCH: usize = 100;

/// Result of a synchronous multi-email validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchValidation {
    pub results: Vec<EnrichedResult>,
    pub total_submitted: usize,
    pub total_unique: usize,
    pub duplicates_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BatchStatistics>,
}

/// Synchronous validation calls.
#[derive(Clone)]
pub struct ValidationService {
    api: ApiClient,
}

impl ValidationService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Validates a single address and enriches the result.
    pub async fn validate_one(
        &self,
        email: &str,
        check_smtp: bool,
        include_raw_dns: bool,
    ) -> Result<EnrichedResult, AppError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        tracing::info!("Validating email: {}", email);
        let mut body = json!({ "email": email });
        if check_smtp {
            body["check_smtp"] = json!(true);
        }
        if include_raw_dns {
            body["include_raw_dns"] = json!(true);
        }

        let response = self
            .api
            .call("Validate email", ApiRequest::post("/validate/email", Some(body)))
            .await?;
        let record: ValidationRecord = serde_json::from_value(response)?;
        Ok(enrich_at(record, self.api.clock().utc_now()))
    }

    /// Validates up to [`MAX_SYNC_BATCH`] addresses in one call.
    ///
    /// The input is deduplicated before submission.
    pub async fn validate_many(
        &self,
        emails: Vec<String>,
        check_smtp: bool,
        include_statistics: bool,
    ) -> Result<BatchValidation, AppError> {
        let total_submitted = emails.len();
        let (emails, duplicates_removed) = dedupe(emails);

        if emails.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one valid email address is required".to_string(),
            ));
        }
        if emails.len() > MAX_SYNC_BATCH {
            return Err(AppError::InvalidInput(format!(
                "Synchronous validation accepts at most {} emails, got {}. Use a batch job instead",
                MAX_SYNC_BATCH,
                emails.len()
            )));
        }

        let total_unique = emails.len();
        tracing::info!(
            "Validating {} emails synchronously ({} duplicates removed)",
            total_unique,
            duplicates_removed
        );
        let mut body = json!({ "emails": emails });
        if check_smtp {
            body["check_smtp"] = json!(true);
        }

        let response = self
            .api
            .call("Validate batch", ApiRequest::post("/validate/batch", Some(body)))
            .await?;
        let raw = match response {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(AppError::Internal(
                        "Batch validation response has no results".to_string(),
                    ))
                }
            },
            _ => {
                return Err(AppError::Internal(
                    "Unexpected batch validation response".to_string(),
                ))
            }
        };

        let results = enrich_values(raw, self.api.clock().utc_now())?;
        let statistics = include_statistics.then(|| aggregate(&results));

        Ok(BatchValidation {
            results,
            total_submitted,
            total_unique,
            duplicates_removed,
            statistics,
        })
    }
}

/// Billing/account lookups, passed through unchanged.
#[derive(Clone)]
pub struct AccountService {
    api: ApiClient,
}

impl AccountService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn usage(&self) -> Result<Value, AppError> {
        self.api
            .call("Get usage", ApiRequest::get("/billing/usage"))
            .await
    }

    pub async fn plan(&self) -> Result<Value, AppError> {
        self.api
            .call("Get plan", ApiRequest::get("/billing/subscription"))
            .await
    }
}
