use crate::config::types::{
    BudgetConfig, Config, DedupConfig, FieldConfig, HarvestConfig, LoggingConfig, PacingConfig,
    PauseRange, SessionConfig, SourceConfig,
};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Upper bound on concurrent detail workers
pub const MAX_WORKERS: usize = 8;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_pacing_config(&config.pacing)?;
    validate_session_config(&config.session)?;
    validate_output_config(&config.output)?;
    validate_dedup_config(&config.dedup)?;
    validate_logging_config(&config.logging)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates per-run limits
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.quota < 1 {
        return Err(ConfigError::Validation(
            "quota must be >= 1, got 0".to_string(),
        ));
    }

    if config.max_consecutive_empty_pages < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_empty_pages must be >= 1, got 0".to_string(),
        ));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page_size must be >= 1, got 0".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    Ok(())
}

/// Validates pause windows and cadences
fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    validate_pause_range("page_pause_ms", &config.page_pause_ms)?;
    validate_pause_range("short_pause_ms", &config.short_pause_ms)?;
    validate_pause_range("long_pause_ms", &config.long_pause_ms)?;

    if config.long_pause_every < 1 {
        return Err(ConfigError::Validation(
            "long_pause_every must be >= 1, got 0".to_string(),
        ));
    }

    if config.rotate_session_every < 1 {
        return Err(ConfigError::Validation(
            "rotate_session_every must be >= 1, got 0".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1, got 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_pause_range(name: &str, range: &PauseRange) -> Result<(), ConfigError> {
    if range.is_inverted() {
        return Err(ConfigError::Validation(format!(
            "{} must be [min, max] with min <= max, got [{}, {}]",
            name, range.min_ms, range.max_ms
        )));
    }
    Ok(())
}

/// Validates HTTP session settings
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.page_load_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page_load_timeout_secs must be >= 1, got 0".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1, got 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates dedup store configuration
fn validate_dedup_config(config: &DedupConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "dedup directory cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "dedup database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if let Some(file) = &config.file {
        if file.is_empty() || file.ends_with('/') || file.ends_with('\\') {
            return Err(ConfigError::Validation(format!(
                "logging file must name a file, got '{}'",
                file
            )));
        }
    }
    Ok(())
}

/// Validates the configured sources
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut labels = HashSet::new();

    for source in sources {
        if source.name.is_empty() {
            return Err(ConfigError::Validation(
                "Source name cannot be empty".to_string(),
            ));
        }

        if !labels.insert(source.label()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source '{}'",
                source.label()
            )));
        }

        validate_file_name_part("source name", &source.name)?;
        if let Some(category) = &source.category {
            validate_file_name_part("source category", category)?;
        }
        validate_file_name_part("dedup scope", source.scope())?;
        validate_source_urls(source)?;
        validate_selector(&source.card_selector)?;

        for selector in [
            &source.link_selector,
            &source.listing_ready_selector,
            &source.detail_ready_selector,
        ]
        .into_iter()
        .flatten()
        {
            validate_selector(selector)?;
        }

        if source.link_attr.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' has an empty link_attr",
                source.label()
            )));
        }

        validate_pattern(&source.id_pattern)?;
        validate_budget(source.label(), &source.budget)?;
        validate_fields(source.label(), &source.fields)?;
    }

    Ok(())
}

/// Names, categories and scopes end up in history and artifact file names
fn validate_file_name_part(what: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "{} must contain only alphanumeric characters, '-', '_' or '.', got '{}'",
            what, value
        )));
    }
    Ok(())
}

fn validate_source_urls(source: &SourceConfig) -> Result<(), ConfigError> {
    if !source.listing_url.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing_url for '{}' must contain a {{page}} placeholder",
            source.label()
        )));
    }

    for candidate in [source.listing_url.replace("{page}", "1"), source.entry_url()] {
        let url = Url::parse(&candidate).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid URL '{}': {}", candidate, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "URL '{}' must use HTTP or HTTPS",
                candidate
            )));
        }
    }

    Ok(())
}

fn validate_budget(label: String, budget: &BudgetConfig) -> Result<(), ConfigError> {
    match budget {
        BudgetConfig::PaginationLinks { selector } => validate_selector(selector),
        BudgetConfig::PaginationText { selector, pattern }
        | BudgetConfig::TotalCount { selector, pattern } => {
            validate_selector(selector)?;
            validate_pattern(pattern)
        }
        BudgetConfig::Fixed { pages } => {
            if *pages < 1 {
                return Err(ConfigError::Validation(format!(
                    "Fixed budget for '{}' must be >= 1 page",
                    label
                )));
            }
            Ok(())
        }
    }
}

fn validate_fields(label: String, fields: &[FieldConfig]) -> Result<(), ConfigError> {
    if fields.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Source '{}' must define at least one field",
            label
        )));
    }

    let mut names = HashSet::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' has a field with an empty name",
                label
            )));
        }

        if matches!(field.name.as_str(), "link" | "source" | "scraped_at") {
            return Err(ConfigError::Validation(format!(
                "Field name '{}' is reserved",
                field.name
            )));
        }

        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate field '{}' in source '{}'",
                field.name, label
            )));
        }

        validate_selector(&field.selector)?;
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}
