//! Crawler configuration: built-in defaults, an optional `key = value` file,
//! then command-line overrides.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use image_crawler_core::download::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use image_crawler_core::download::DEFAULT_MAX_ATTEMPTS;
use image_crawler_core::validate::DEFAULT_MIN_DIMENSION;
use image_crawler_core::{DEFAULT_MAX_WORKERS, Provider};

use crate::cli::Args;

const CONFIG_DIR_NAME: &str = "image-crawler";
const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_IMAGES_PER_KEYWORD: usize = 100;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Effective crawler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// Root of the per-keyword image directories.
    pub downloads_dir: PathBuf,
    /// Where per-keyword record files live.
    pub records_dir: PathBuf,
    /// Where log files go when `log_to_file` is set.
    pub logs_dir: PathBuf,
    /// Where candidate URL lists are read from.
    pub candidates_dir: PathBuf,
    pub min_width: u32,
    pub min_height: u32,
    /// Per-attempt request timeout.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Fetch attempts per image, first one included.
    pub max_attempts: u32,
    /// Fixed pause between fetch attempts.
    pub retry_delay_ms: u64,
    pub max_workers: usize,
    pub images_per_keyword: usize,
    pub provider: Provider,
    pub log_to_file: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            records_dir: PathBuf::from("records"),
            logs_dir: PathBuf::from("logs"),
            candidates_dir: PathBuf::from("candidates"),
            min_width: DEFAULT_MIN_DIMENSION,
            min_height: DEFAULT_MIN_DIMENSION,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_workers: DEFAULT_MAX_WORKERS,
            images_per_keyword: DEFAULT_IMAGES_PER_KEYWORD,
            provider: Provider::Baidu,
            log_to_file: false,
        }
    }
}

impl CrawlerConfig {
    /// Validates values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("min_width", u64::from(self.min_width), 1, 100_000)?;
        validate_range("min_height", u64::from(self.min_height), 1, 100_000)?;
        validate_range("request_timeout_secs", self.request_timeout_secs, 1, 3600)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("max_attempts", u64::from(self.max_attempts), 1, 10)?;
        validate_range("retry_delay_ms", self.retry_delay_ms, 0, 60_000)?;
        validate_range("max_workers", self.max_workers as u64, 1, 100)?;
        validate_range("images_per_keyword", self.images_per_keyword as u64, 1, 100_000)?;
        Ok(())
    }

    /// Applies command-line values that were actually given.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(num_images) = args.num_images {
            self.images_per_keyword = usize::try_from(num_images).unwrap_or(usize::MAX);
        }
        if let Some(max_workers) = args.max_workers {
            self.max_workers = usize::from(max_workers);
        }
        if let Some(engine) = args.engine {
            self.provider = engine;
        }
        if args.log_to_file {
            self.log_to_file = true;
        }
    }
}

fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config path that was consulted, if any could be resolved.
    pub path: Option<PathBuf>,
    /// Defaults merged with the file's values.
    pub config: CrawlerConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/image-crawler/config.toml`
/// 2. `$HOME/.config/image-crawler/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit`, or from the default path when it exists.
///
/// An explicit path must exist; a missing default file just means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: CrawlerConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<CrawlerConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<CrawlerConfig> {
    let mut cfg = CrawlerConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() || (line.starts_with('[') && line.ends_with(']')) {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "downloads_dir" => cfg.downloads_dir = parse_path(value).with_context(invalid)?,
            "records_dir" => cfg.records_dir = parse_path(value).with_context(invalid)?,
            "logs_dir" => cfg.logs_dir = parse_path(value).with_context(invalid)?,
            "candidates_dir" => cfg.candidates_dir = parse_path(value).with_context(invalid)?,
            "min_width" => cfg.min_width = parse_u32(value).with_context(invalid)?,
            "min_height" => cfg.min_height = parse_u32(value).with_context(invalid)?,
            "request_timeout_secs" => {
                cfg.request_timeout_secs = parse_integer_u64(value).with_context(invalid)?;
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = parse_integer_u64(value).with_context(invalid)?;
            }
            "max_attempts" => cfg.max_attempts = parse_u32(value).with_context(invalid)?,
            "retry_delay_ms" => cfg.retry_delay_ms = parse_integer_u64(value).with_context(invalid)?,
            "max_workers" => cfg.max_workers = parse_usize(value).with_context(invalid)?,
            "images_per_keyword" => {
                cfg.images_per_keyword = parse_usize(value).with_context(invalid)?;
            }
            "provider" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.provider = parsed
                    .parse::<Provider>()
                    .with_context(|| format!("Invalid `provider` value '{parsed}' on line {line_no}"))?;
            }
            "log_to_file" => cfg.log_to_file = parse_boolean(value).with_context(invalid)?,
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_path(raw_value: &str) -> Result<PathBuf> {
    let parsed = parse_string_literal(raw_value)?;
    if parsed.trim().is_empty() {
        bail!("Expected non-empty path");
    }
    Ok(PathBuf::from(parsed))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow!("Integer value out of range for u64"))
}

fn parse_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow!("Integer value out of range for u32"))
}

fn parse_usize(raw_value: &str) -> Result<usize> {
    let value = parse_integer_u64(raw_value)?;
    usize::try_from(value).map_err(|_| anyhow!("Integer value out of range for usize"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected boolean value (true or false)"),
    }
}
