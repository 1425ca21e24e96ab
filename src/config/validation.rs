use crate::analyzer::RuleEntry;
use crate::config::types::{Config, EnrichmentConfig, FetcherConfig, OutputConfig, WorkerConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Upper bound on the worker pool; each worker drives its own browser
const MAX_WORKERS: usize = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_worker_config(&config.worker)?;
    validate_job_lease(&config.worker, &config.fetcher)?;
    validate_output_config(&config.output)?;
    if let Some(enrichment) = &config.enrichment {
        validate_enrichment_config(enrichment)?;
    }
    validate_rules(&config.analyzer.rules)?;
    Ok(())
}

/// Validates headless browser configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout_ms < 1_000 || config.navigation_timeout_ms > 300_000 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout_ms must be between 1000 and 300000, got {}",
            config.navigation_timeout_ms
        )));
    }

    if config.network_idle_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "network_idle_ms must be >= 100ms, got {}ms",
            config.network_idle_ms
        )));
    }

    if config.network_idle_ms >= config.navigation_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "network_idle_ms ({}) must be shorter than navigation_timeout_ms ({})",
            config.network_idle_ms, config.navigation_timeout_ms
        )));
    }

    if config.window_width == 0 || config.window_height == 0 {
        return Err(ConfigError::Validation(format!(
            "window size must be non-zero, got {}x{}",
            config.window_width, config.window_height
        )));
    }

    if let Some(user_agent) = &config.user_agent {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates worker pool configuration
fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.count < 1 || config.count > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "worker count must be between 1 and {}, got {}",
            MAX_WORKERS, config.count
        )));
    }

    if config.poll_interval_ms < 50 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 50ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    Ok(())
}

/// A job lease must outlast the longest fetch a live worker can run
fn validate_job_lease(worker: &WorkerConfig, fetcher: &FetcherConfig) -> Result<(), ConfigError> {
    let session = fetcher.session_timeout();
    if worker.job_lease() <= session {
        return Err(ConfigError::Validation(format!(
            "job_lease_ms ({}) must be longer than the fetch session limit ({}ms)",
            worker.job_lease_ms,
            session.as_millis()
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates enrichment endpoint configuration
fn validate_enrichment_config(config: &EnrichmentConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.timeout_ms < 1_000 {
        return Err(ConfigError::Validation(format!(
            "enrichment timeout_ms must be >= 1000, got {}",
            config.timeout_ms
        )));
    }

    if let Some(key) = &config.api_key {
        if key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api_key cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates extra analyzer rules
fn validate_rules(rules: &[RuleEntry]) -> Result<(), ConfigError> {
    for entry in rules {
        validate_kind_label(&entry.kind)?;

        let source = entry.rule.selector_source().ok_or_else(|| {
            ConfigError::InvalidRule(format!(
                "Rule '{}' needs at least one tag, keyword or role",
                entry.kind
            ))
        })?;

        Selector::parse(&source).map_err(|e| {
            ConfigError::InvalidRule(format!(
                "Rule '{}' produces an invalid selector '{}': {:?}",
                entry.kind, source, e
            ))
        })?;

        if let (Some(max), Some(min)) = (entry.rule.max_length, entry.rule.min_text_length) {
            if max < min {
                return Err(ConfigError::InvalidRule(format!(
                    "Rule '{}' has max-length {} below min-text-length {}",
                    entry.kind, max, min
                )));
            }
        }
    }

    Ok(())
}

/// Kind labels become tags and display names, so keep them simple
fn validate_kind_label(kind: &str) -> Result<(), ConfigError> {
    let kind = kind.trim();

    if kind.is_empty() {
        return Err(ConfigError::InvalidRule(
            "Rule kind cannot be empty".to_string(),
        ));
    }

    if !kind
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::InvalidRule(format!(
            "Rule kind '{}' must contain only letters, digits, '-' and '_'",
            kind
        )));
    }

    Ok(())
}
