use crate::config::types::{Config, SourceConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use gleaner::config::load_config;
///
/// let config = load_config(Path::new("gleaner.toml")).unwrap();
/// println!("Quota: {}", config.harvest.quota);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at the start of every run so artifacts can be traced back to the
/// exact configuration that produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Picks the source to harvest in this invocation
///
/// `selector` matches either a source name or a `name/category` label. A bare
/// name shared by several categories is narrowed by `category` if given,
/// otherwise one of them is chosen at random. With no selector at all, any
/// configured source may be chosen.
pub fn select_source<'a>(
    config: &'a Config,
    selector: Option<&str>,
    category: Option<&str>,
) -> Result<&'a SourceConfig, ConfigError> {
    if config.sources.is_empty() {
        return Err(ConfigError::NoSources);
    }

    let candidates: Vec<&SourceConfig> = config
        .sources
        .iter()
        .filter(|s| match selector {
            Some(sel) => s.name == sel || s.label() == sel,
            None => true,
        })
        .filter(|s| match category {
            Some(cat) => s.category.as_deref() == Some(cat),
            None => true,
        })
        .collect();

    if candidates.is_empty() {
        let wanted = match (selector, category) {
            (Some(sel), Some(cat)) => format!("{}/{}", sel, cat),
            (Some(sel), None) => sel.to_string(),
            (None, Some(cat)) => format!("*/{}", cat),
            (None, None) => String::new(),
        };
        return Err(ConfigError::UnknownSource(wanted));
    }

    let index = if candidates.len() == 1 {
        0
    } else {
        rand::rng().random_range(0..candidates.len())
    };

    Ok(candidates[index])
}
