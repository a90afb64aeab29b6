use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::harvest::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://programaintegraldefruticultura.com.co";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub navigation_timeout_secs: u64,
    pub retry_delay_ms: u64,
    pub excluded_organizations: BTreeSet<u32>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            navigation_timeout_secs: 60,
            retry_delay_ms: 500,
            excluded_organizations: BTreeSet::new(),
        }
    }
}

impl PortalConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::navigation(Duration::from_millis(self.retry_delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub root_folder_id: String,
    pub oauth_port: u16,
    pub oauth_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            root_folder_id: "root".to_string(),
            oauth_port: 3000,
            oauth_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub headless: bool,
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub print_background: bool,
    pub wait_selector: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            headless: true,
            paper_width_in: 8.5,
            paper_height_in: 11.0,
            print_background: true,
            wait_selector: Some("#print-button".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarvestConfig {
    pub portal: PortalConfig,
    pub drive: DriveConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialHarvestConfig {
    portal: Option<PortalConfig>,
    drive: Option<DriveConfig>,
    render: Option<RenderConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u16(var: &str, fallback: u16) -> u16 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u16>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if v.trim().is_empty() || v.trim() == "none" => None,
        Ok(v) => Some(v.trim().to_string()),
        Err(_) => fallback,
    }
}

fn env_or_id_set(var: &str, fallback: &BTreeSet<u32>) -> BTreeSet<u32> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter_map(|s| s.parse::<u32>().ok())
                .collect::<BTreeSet<_>>();
            if out.is_empty() {
                fallback.clone()
            } else {
                out
            }
        }
        Err(_) => fallback.clone(),
    }
}

fn validate(cfg: &HarvestConfig) -> Result<()> {
    let base = cfg.portal.base_url.trim();
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(anyhow!(
            "invalid portal base url `{base}`: must start with http:// or https://"
        ));
    }
    if cfg.portal.navigation_timeout_secs == 0 {
        return Err(anyhow!("invalid navigation timeout: must be >= 1 second"));
    }
    if cfg.drive.root_folder_id.trim().is_empty() {
        return Err(anyhow!("invalid drive root folder id: cannot be empty"));
    }
    if cfg.drive.oauth_timeout_secs == 0 {
        return Err(anyhow!("invalid oauth timeout: must be >= 1 second"));
    }
    if !(cfg.render.paper_width_in > 0.0 && cfg.render.paper_height_in > 0.0) {
        return Err(anyhow!("invalid paper size: width and height must be > 0"));
    }
    Ok(())
}

fn merge_file_config(base: &mut HarvestConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialHarvestConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse harvest config {}: {err}", path.display()))?;
    if let Some(portal) = parsed.portal {
        base.portal = portal;
    }
    if let Some(drive) = parsed.drive {
        base.drive = drive;
    }
    if let Some(render) = parsed.render {
        base.render = render;
    }
    Ok(())
}

/// Defaults, then the TOML file at `path` (if present), then `HARVEST_*`
/// environment overrides, then validation.
pub fn load_config(path: &Path) -> Result<HarvestConfig> {
    let mut cfg = HarvestConfig::default();
    merge_file_config(&mut cfg, path)?;

    cfg.portal.base_url = env_or_string("HARVEST_BASE_URL", &cfg.portal.base_url)
        .trim_end_matches('/')
        .to_string();
    cfg.portal.navigation_timeout_secs = env_or_u64(
        "HARVEST_NAV_TIMEOUT_SECS",
        cfg.portal.navigation_timeout_secs,
    );
    cfg.portal.retry_delay_ms = env_or_u64("HARVEST_RETRY_DELAY_MS", cfg.portal.retry_delay_ms);
    cfg.portal.excluded_organizations = env_or_id_set(
        "HARVEST_EXCLUDED_ORGANIZATIONS",
        &cfg.portal.excluded_organizations,
    );
    cfg.drive.root_folder_id = env_or_string("HARVEST_DRIVE_ROOT_FOLDER", &cfg.drive.root_folder_id);
    cfg.drive.oauth_port = env_or_u16("HARVEST_OAUTH_PORT", cfg.drive.oauth_port);
    cfg.drive.oauth_timeout_secs =
        env_or_u64("HARVEST_OAUTH_TIMEOUT_SECS", cfg.drive.oauth_timeout_secs);
    cfg.render.headless = env_or_bool("HARVEST_HEADLESS", cfg.render.headless);
    cfg.render.wait_selector = env_or_optional_string(
        "HARVEST_RENDER_WAIT_SELECTOR",
        cfg.render.wait_selector.clone(),
    );

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let cfg = HarvestConfig::default();
        validate(&cfg).expect("defaults validate");
        assert_eq!(cfg.portal.retry_policy().retries, 1);
        assert_eq!(cfg.portal.navigation_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.drive.root_folder_id, "root");
    }

    #[test]
    fn file_sections_replace_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("harvest.toml");
        fs::write(
            &path,
            r#"
[portal]
base_url = "https://staging.example.org"
navigation_timeout_secs = 30
navigation_retries = 3
retry_delay_ms = 0
excluded_organizations = [7]

[drive]
root_folder_id = "1AbCdEf"
oauth_port = 8085
oauth_timeout_secs = 120
"#,
        )
        .expect("write config");

        let mut cfg = HarvestConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        validate(&cfg).expect("valid");

        assert_eq!(cfg.portal.base_url, "https://staging.example.org");
        assert_eq!(cfg.portal.navigation_timeout_secs, 30);
        assert_eq!(cfg.portal.retry_policy().retries, 1);
        assert!(cfg.portal.retry_policy().delay.is_zero());
        assert!(cfg.portal.excluded_organizations.contains(&7));
        assert_eq!(cfg.drive.root_folder_id, "1AbCdEf");
        assert_eq!(cfg.drive.oauth_port, 8085);
        assert!(cfg.render.headless);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("harvest.toml");
        fs::write(&path, "[render]\nheadless = false\n").expect("write config");

        let mut cfg = HarvestConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");

        assert!(!cfg.render.headless);
        assert_eq!(cfg.render.paper_width_in, 8.5);
        assert_eq!(cfg.render.wait_selector.as_deref(), Some("#print-button"));
    }

    #[test]
    fn missing_file_is_ignored() {
        let tmp = tempdir().expect("tempdir");
        let mut cfg = HarvestConfig::default();
        merge_file_config(&mut cfg, &tmp.path().join("absent.toml")).expect("merge");
        assert_eq!(cfg.portal.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = HarvestConfig::default();
        cfg.portal.base_url = "ftp://portal".into();
        assert!(validate(&cfg).is_err());

        let mut cfg = HarvestConfig::default();
        cfg.portal.navigation_timeout_secs = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = HarvestConfig::default();
        cfg.drive.root_folder_id = "  ".into();
        assert!(validate(&cfg).is_err());
    }
}
