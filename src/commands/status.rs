use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::gdrive::oauth;
use crate::harvest::config::load_config;
use crate::harvest::dictionaries;
use crate::harvest::paths::resolve_paths;
use crate::harvest::util::now_epoch_secs;

include!(concat!(env!("OUT_DIR"), "/harvest_env_allowlist.rs"));

/// `HARVEST_*` variables this binary reads that are set in the environment.
fn configured_env_keys() -> Vec<&'static str> {
    GENERATED_HARVEST_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("harvest_home={}", paths.harvest_home.display()));
    report.detail(format!("pdf_dir={}", paths.pdf_dir.display()));
    report.detail(format!("data_dir={}", paths.data_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    if let Some(chrome) = &paths.chrome_bin {
        report.detail(format!("chrome_bin={}", chrome.display()));
    }

    match load_config(&paths.config_file) {
        Ok(cfg) => {
            report.detail(format!("base_url={}", cfg.portal.base_url));
            report.detail(format!("root_folder_id={}", cfg.drive.root_folder_id));
            report.detail(format!(
                "navigation=timeout:{}s,retries:{}",
                cfg.portal.navigation_timeout_secs,
                cfg.portal.retry_policy().retries
            ));
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    match dictionaries::load(&paths.data_dir) {
        Ok(dicts) => {
            report.detail(format!(
                "associations={} ({})",
                dicts.associations.len(),
                dicts.associations_source.label()
            ));
            report.detail(format!(
                "forms={} ({})",
                dicts.forms.len(),
                dicts.forms_source.label()
            ));
        }
        Err(err) => report.issue(format!("dictionaries invalid: {err:#}")),
    }

    let credentials_state = if paths.drive_credentials_file.exists() {
        "present"
    } else {
        "missing"
    };
    report.detail(format!("drive_credentials={credentials_state}"));
    let now = now_epoch_secs()?;
    let token_state = match oauth::load_token(&paths.drive_token_file) {
        Ok(None) => "missing".to_string(),
        Ok(Some(token)) if token.is_fresh(now) => "valid".to_string(),
        Ok(Some(token)) if token.refresh_token.is_some() => "refreshable".to_string(),
        Ok(Some(_)) => "expired".to_string(),
        Err(err) => format!("unreadable ({err:#})"),
    };
    report.detail(format!("drive_token={token_state}"));

    let keys = configured_env_keys();
    if !keys.is_empty() {
        report.detail(format!("env_overrides={}", keys.join(",")));
    }

    Ok(report)
}
