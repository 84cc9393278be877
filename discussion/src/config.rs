use std::{str::FromStr, time::Duration};

use crate::comment::trim::TrimLimits;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub env: Env,
    pub trim: TrimLimits,
    /// Posts older than this (and their comments) no longer accept votes,
    /// comments or edits.
    pub archive_post_after: chrono::TimeDelta,
    pub allow_self_vote: bool,
    pub edit_history_enabled: bool,
    pub vote_dedup_window: Duration,
    pub storage_timeout: Duration,
    pub comment_cache_ttl: Duration,
    pub max_comment_length: usize,
    pub posts_per_page: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            env: Env::Dev,
            trim: TrimLimits::default(),
            archive_post_after: chrono::TimeDelta::days(60),
            allow_self_vote: true,
            edit_history_enabled: true,
            vote_dedup_window: Duration::from_secs(3),
            storage_timeout: Duration::from_millis(5000),
            comment_cache_ttl: Duration::from_secs(30),
            max_comment_length: 16384,
            posts_per_page: 25,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VarError {
    #[error("environment variable `{0}` is required")]
    Missing(String),
    #[error("environment variable `{0}` is not valid unicode")]
    NotUnicode(String),
    #[error("environment variable `{key}` has invalid value `{raw}`")]
    Invalid { key: String, raw: String },
}

/// Reads `key` and parses its trimmed value. `Ok(None)` when it is unset.
pub fn parsed_var<T: FromStr>(key: &str) -> Result<Option<T>, VarError> {
    let raw = match std::env::var(key) {
        Ok(raw) => raw,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => return Err(VarError::NotUnicode(key.into())),
    };

    let parsed = raw.trim().parse();
    match parsed {
        Ok(val) => Ok(Some(val)),
        Err(_) => Err(VarError::Invalid {
            key: key.into(),
            raw,
        }),
    }
}

pub fn required_var<T: FromStr>(key: &str) -> Result<T, VarError> {
    parsed_var(key)?.ok_or_else(|| VarError::Missing(key.into()))
}

/// Like [`parsed_var`], but any problem is logged and answered with
/// `default`.
fn var_or<T: FromStr + std::fmt::Debug>(key: &str, default: T) -> T {
    match parsed_var(key) {
        Ok(Some(val)) => val,
        Ok(None) => {
            tracing::warn!(key, ?default, "environment variable not set, using default");
            default
        }
        Err(e) => {
            tracing::warn!(?default, "{e}, using default");
            default
        }
    }
}

impl EngineConfig {
    pub fn new_from_env() -> Self {
        let defaults = EngineConfig::default();

        EngineConfig {
            env: match var_or("ENVIRONMENT", String::from("dev")).as_str() {
                "staging" => Env::Staging,
                "production" => Env::Production,
                _ => Env::Dev,
            },
            trim: TrimLimits {
                max_depth: var_or("COMMENT_MAX_DEPTH", defaults.trim.max_depth),
                root_breadth: var_or("COMMENT_ROOT_BREADTH", defaults.trim.root_breadth),
                nested_breadth: var_or(
                    "COMMENT_NESTED_BREADTH",
                    defaults.trim.nested_breadth,
                ),
            },
            archive_post_after: chrono::TimeDelta::days(var_or(
                "ARCHIVE_POST_AFTER_DAYS",
                defaults.archive_post_after.num_days(),
            )),
            allow_self_vote: var_or("ALLOW_SELF_VOTE", defaults.allow_self_vote),
            edit_history_enabled: var_or(
                "EDIT_HISTORY_ENABLED",
                defaults.edit_history_enabled,
            ),
            vote_dedup_window: Duration::from_secs(var_or(
                "VOTE_DEDUP_WINDOW_SECS",
                defaults.vote_dedup_window.as_secs(),
            )),
            storage_timeout: Duration::from_millis(var_or(
                "STORAGE_TIMEOUT_MS",
                defaults.storage_timeout.as_millis() as u64,
            )),
            comment_cache_ttl: Duration::from_secs(var_or(
                "COMMENT_CACHE_TTL_SECS",
                defaults.comment_cache_ttl.as_secs(),
            )),
            max_comment_length: var_or("MAX_COMMENT_LENGTH", defaults.max_comment_length),
            posts_per_page: var_or("POSTS_PER_PAGE", defaults.posts_per_page),
        }
    }
}
