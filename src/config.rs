// src/config.rs
//! Startup configuration. Read once, immutable afterwards.
//!
//! Lookup order:
//! 1) $PRICE_MONITOR_CONFIG
//! 2) config/price_monitor.toml
//! 3) config/price_monitor.json
//!
//! `SCHEDULE_TIME`, `FETCH_TIMEOUT_SECS` and `LOG_FILE` override file values.

use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discover::fetch::DEFAULT_USER_AGENT;
use crate::discover::listing::DEFAULT_LINK_MARKER;
use crate::error::ConfigError;
use crate::ingest::types::Source;
use crate::schedule::{DailyTime, ReferenceZone, SchedulerCfg, REFERENCE_UTC_OFFSET_HOURS};

pub const ENV_CONFIG_PATH: &str = "PRICE_MONITOR_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/price_monitor.toml";
pub const DEFAULT_JSON_PATH: &str = "config/price_monitor.json";

pub const ENV_SCHEDULE_TIME: &str = "SCHEDULE_TIME";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";
pub const ENV_LOG_FILE: &str = "LOG_FILE";

/// Trigger resolution: a due run starts at most this late.
pub const MAX_POLL_INTERVAL_SECS: u64 = 60;

fn default_offset_hours() -> i32 {
    REFERENCE_UTC_OFFSET_HOURS
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_log_file() -> String {
    "logs/scraper.log".into()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_link_marker() -> String {
    DEFAULT_LINK_MARKER.into()
}
fn default_download_dir() -> String {
    "downloads".into()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct RawSource {
    name: Option<String>,
    listing_url: Option<String>,
    #[serde(default)]
    fallback_document_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    schedule_time: Option<String>,
    #[serde(default = "default_offset_hours")]
    reference_utc_offset_hours: i32,
    #[serde(default = "default_fetch_timeout_secs")]
    fetch_timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_link_marker")]
    link_marker: String,
    #[serde(default = "default_download_dir")]
    download_dir: String,
    #[serde(default = "default_true")]
    schedule_enabled: bool,
    #[serde(default = "default_true")]
    run_on_startup: bool,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub schedule_time: DailyTime,
    pub zone: ReferenceZone,
    pub fetch_timeout: Duration,
    pub poll_interval: Duration,
    pub log_file: PathBuf,
    pub user_agent: String,
    pub link_marker: String,
    pub download_dir: PathBuf,
    /// `false`: run once and exit.
    pub schedule_enabled: bool,
    pub run_on_startup: bool,
    pub sources: Vec<Source>,
}

impl AppConfig {
    pub fn scheduler_cfg(&self) -> SchedulerCfg {
        SchedulerCfg {
            trigger: self.schedule_time,
            zone: self.zone,
            poll_interval: self.poll_interval,
            run_on_startup: self.run_on_startup,
        }
    }
}

/// Load from an explicit path (TOML or JSON) and apply env overrides.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut raw = parse_raw(&content, &ext)?;
    apply_overrides(&mut raw, |k| std::env::var(k).ok());
    validate(raw)
}

/// Load using `$PRICE_MONITOR_CONFIG` then the default paths.
pub fn load_default() -> Result<AppConfig, ConfigError> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(&p);
        if !pb.exists() {
            return Err(ConfigError::NotFound(p));
        }
        return load_from(&pb);
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Err(ConfigError::NotFound(DEFAULT_TOML_PATH.to_string()))
}

/// Parse config text. `hint_ext` picks the first format to try.
pub fn parse_str(s: &str, hint_ext: &str) -> Result<AppConfig, ConfigError> {
    validate(parse_raw(s, hint_ext)?)
}

fn parse_raw(s: &str, hint_ext: &str) -> Result<RawConfig, ConfigError> {
    if hint_ext == "json" {
        return serde_json::from_str(s).map_err(|e| ConfigError::Format(e.to_string()));
    }
    match toml::from_str::<RawConfig>(s) {
        Ok(v) => Ok(v),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| ConfigError::Format(toml_err.to_string())),
    }
}

fn apply_overrides(raw: &mut RawConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup(ENV_SCHEDULE_TIME) {
        raw.schedule_time = Some(v);
    }
    if let Some(v) = lookup(ENV_FETCH_TIMEOUT_SECS) {
        // Unparseable values surface as a zero timeout and fail validation.
        raw.fetch_timeout_secs = v.trim().parse().unwrap_or(0);
    }
    if let Some(v) = lookup(ENV_LOG_FILE) {
        raw.log_file = v;
    }
}

fn validate(raw: RawConfig) -> Result<AppConfig, ConfigError> {
    let schedule_time: DailyTime = raw
        .schedule_time
        .as_deref()
        .ok_or(ConfigError::MissingSetting("schedule_time"))?
        .parse()?;
    let zone = ReferenceZone::from_hours(raw.reference_utc_offset_hours)?;

    if raw.fetch_timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "fetch_timeout_secs",
            value: raw.fetch_timeout_secs.to_string(),
        });
    }
    if raw.poll_interval_secs == 0 || raw.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
        return Err(ConfigError::InvalidValue {
            key: "poll_interval_secs",
            value: raw.poll_interval_secs.to_string(),
        });
    }
    if raw.link_marker.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "link_marker",
            value: raw.link_marker,
        });
    }

    if raw.sources.is_empty() {
        return Err(ConfigError::NoSources);
    }
    let mut sources = Vec::with_capacity(raw.sources.len());
    for (index, s) in raw.sources.into_iter().enumerate() {
        let name = s
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::MissingField {
                index,
                field: "name",
            })?;
        let listing_url = s
            .listing_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingField {
                index,
                field: "listing_url",
            })?;
        if Url::parse(&listing_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "listing_url",
                value: listing_url,
            });
        }
        sources.push(Source {
            name,
            listing_url,
            fallback_document_url: s.fallback_document_url.filter(|u| !u.trim().is_empty()),
        });
    }

    Ok(AppConfig {
        schedule_time,
        zone,
        fetch_timeout: Duration::from_secs(raw.fetch_timeout_secs),
        poll_interval: Duration::from_secs(raw.poll_interval_secs),
        log_file: PathBuf::from(raw.log_file),
        user_agent: raw.user_agent,
        link_marker: raw.link_marker,
        download_dir: PathBuf::from(raw.download_dir),
        schedule_enabled: raw.schedule_enabled,
        run_on_startup: raw.run_on_startup,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
schedule_time = "08:00"

[[sources]]
name = "Caraga"
listing_url = "https://caraga.da.gov.ph/weekly-price-update/"
"#;

    #[test]
    fn minimal_toml_gets_defaults() {
        let cfg = parse_str(MINIMAL, "toml").unwrap();
        assert_eq!(cfg.schedule_time.to_string(), "08:00");
        assert_eq!(cfg.zone, ReferenceZone::default());
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(30));
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.log_file, PathBuf::from("logs/scraper.log"));
        assert_eq!(cfg.link_marker, "PriceMonitoring");
        assert!(cfg.schedule_enabled && cfg.run_on_startup);
        assert_eq!(cfg.sources, vec![Source::new("Caraga", "https://caraga.da.gov.ph/weekly-price-update/")]);
    }

    #[test]
    fn json_is_accepted() {
        let json = r#"{"schedule_time":"07:30","sources":[{"name":"A","listing_url":"https://a.gov.ph/","fallback_document_url":"https://a.gov.ph/x.pdf"}]}"#;
        let cfg = parse_str(json, "json").unwrap();
        assert_eq!(cfg.schedule_time.to_string(), "07:30");
        assert_eq!(
            cfg.sources[0].fallback_document_url.as_deref(),
            Some("https://a.gov.ph/x.pdf")
        );
        // No hint: TOML fails, JSON is tried next.
        assert!(parse_str(json, "").is_ok());
    }

    #[test]
    fn missing_required_settings_are_fatal() {
        let no_sources = r#"schedule_time = "08:00""#;
        assert!(matches!(parse_str(no_sources, "toml"), Err(ConfigError::NoSources)));

        let no_time = "[[sources]]\nname = \"A\"\nlisting_url = \"https://a.gov.ph/\"\n";
        assert!(matches!(
            parse_str(no_time, "toml"),
            Err(ConfigError::MissingSetting("schedule_time"))
        ));

        let no_url = "schedule_time = \"08:00\"\n[[sources]]\nname = \"A\"\n";
        assert!(matches!(
            parse_str(no_url, "toml"),
            Err(ConfigError::MissingField { index: 0, field: "listing_url" })
        ));

        let bad_time = MINIMAL.replace("08:00", "25:00");
        assert!(matches!(
            parse_str(&bad_time, "toml"),
            Err(ConfigError::InvalidScheduleTime(_))
        ));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = [
            (ENV_SCHEDULE_TIME, "06:15"),
            (ENV_FETCH_TIMEOUT_SECS, "5"),
            (ENV_LOG_FILE, "/tmp/pm.log"),
        ]
        .into_iter()
        .collect();
        let mut raw = parse_raw(MINIMAL, "toml").unwrap();
        apply_overrides(&mut raw, |k| env.get(k).map(|v| v.to_string()));
        let cfg = validate(raw).unwrap();
        assert_eq!(cfg.schedule_time.to_string(), "06:15");
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(5));
        assert_eq!(cfg.log_file, PathBuf::from("/tmp/pm.log"));
    }

    #[test]
    fn poll_interval_is_bounded_to_a_minute() {
        let ok = MINIMAL.replace("schedule_time = \"08:00\"", "schedule_time = \"08:00\"\npoll_interval_secs = 60");
        assert_eq!(parse_str(&ok, "toml").unwrap().poll_interval, Duration::from_secs(60));

        for bad in ["0", "61", "3600"] {
            let cfg = MINIMAL.replace(
                "schedule_time = \"08:00\"",
                &format!("schedule_time = \"08:00\"\npoll_interval_secs = {bad}"),
            );
            assert!(
                matches!(
                    parse_str(&cfg, "toml"),
                    Err(ConfigError::InvalidValue { key: "poll_interval_secs", .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn garbage_timeout_override_is_rejected() {
        let mut raw = parse_raw(MINIMAL, "toml").unwrap();
        apply_overrides(&mut raw, |k| (k == ENV_FETCH_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert!(matches!(
            validate(raw),
            Err(ConfigError::InvalidValue { key: "fetch_timeout_secs", .. })
        ));
    }
}
