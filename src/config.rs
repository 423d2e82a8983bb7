use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub api_base_url: String,
    pub api_key: String,
    pub api_key_header: String,
    pub request_timeout_secs: u64,
    pub retry_base_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_base_url: std::env::var("EMAIL_API_BASE_URL")
                .map_err(|_| anyhow::anyhow!("EMAIL_API_BASE_URL environment variable required"))
                .and_then(|raw| {
                    if raw.trim().is_empty() {
                        anyhow::bail!("EMAIL_API_BASE_URL cannot be empty");
                    }
                    let parsed = url::Url::parse(raw.trim()).map_err(|e| {
                        anyhow::anyhow!("EMAIL_API_BASE_URL is not a valid URL: {}", e)
                    })?;
                    if parsed.scheme() != "http" && parsed.scheme() != "https" {
                        anyhow::bail!("EMAIL_API_BASE_URL must start with http:// or https://");
                    }
                    Ok(raw.trim().trim_end_matches('/').to_string())
                })?,
            api_key: std::env::var("EMAIL_API_KEY")
                .map_err(|_| anyhow::anyhow!("EMAIL_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("EMAIL_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            api_key_header: std::env::var("EMAIL_API_KEY_HEADER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "X-API-Key".to_string()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("REQUEST_TIMEOUT_SECS must be a number of seconds"))?,
            retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("RETRY_BASE_DELAY_MS must be a number of milliseconds")
                })?,
        };

        // Never log the API key itself
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Validation API base URL: {}", config.api_base_url);
        tracing::debug!("API key header: {}", config.api_key_header);
        tracing::debug!(
            "Request timeout: {}s, retry base delay: {}ms",
            config.request_timeout_secs,
            config.retry_base_delay_ms
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
