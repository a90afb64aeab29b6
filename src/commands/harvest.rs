use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use chrono_tz::America::Bogota;
use std::env;

use crate::commands::CommandReport;
use crate::error::HarvestError;
use crate::gdrive;
use crate::harvest::config::load_config;
use crate::harvest::dictionaries::{self, NameTable};
use crate::harvest::lock::RunLock;
use crate::harvest::orchestrator::{HarvestPlan, run_harvest};
use crate::harvest::paths::resolve_paths;
use crate::harvest::period::generate_months;
use crate::portal::chrome::ChromeSession;
use crate::portal::{Credentials, PortalRoutes};

pub const EMAIL_ENV: &str = "HARVEST_PORTAL_EMAIL";
pub const PASSWORD_ENV: &str = "HARVEST_PORTAL_PASSWORD";

#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    pub email: Option<String>,
    pub password: Option<String>,
    pub year: Option<i32>,
    pub month_start: Option<u32>,
    pub month_end: Option<u32>,
    pub form_type: Option<u32>,
    pub parent_folder_id: Option<String>,
}

/// Flag first, then `var`. Blank values count as missing; anything else is
/// returned byte-for-byte.
fn flag_or_env(flag: Option<&str>, var: &str) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
}

fn resolve_credentials(opts: &HarvestOptions) -> Result<Credentials, HarvestError> {
    let email = flag_or_env(opts.email.as_deref(), EMAIL_ENV)
        .map(|v| v.trim().to_string())
        .ok_or_else(|| {
            HarvestError::InvalidConfig(format!("missing portal email (--email or {EMAIL_ENV})"))
        })?;
    let password = flag_or_env(opts.password.as_deref(), PASSWORD_ENV).ok_or_else(|| {
        HarvestError::InvalidConfig(format!(
            "missing portal password (--password or {PASSWORD_ENV})"
        ))
    })?;
    Ok(Credentials { email, password })
}

/// The portal's reporting calendar runs on Colombian time.
pub fn default_year() -> i32 {
    Utc::now().with_timezone(&Bogota).year()
}

fn select_forms(forms: &NameTable, wanted: Option<u32>) -> Result<Vec<(u32, String)>, HarvestError> {
    match wanted {
        None => Ok(forms.iter().map(|(id, name)| (*id, name.clone())).collect()),
        Some(id) => match forms.get(&id) {
            Some(name) => Ok(vec![(id, name.clone())]),
            None => {
                let known = forms
                    .keys()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                Err(HarvestError::InvalidConfig(format!(
                    "unknown form type {id} (known: {known})"
                )))
            }
        },
    }
}

pub fn run(opts: &HarvestOptions) -> Result<CommandReport> {
    let months = generate_months(opts.month_start, opts.month_end)?;
    let credentials = resolve_credentials(opts)?;
    let year = opts.year.unwrap_or_else(default_year);

    let paths = resolve_paths()?;
    let cfg = load_config(&paths.config_file)?;
    let dicts = dictionaries::load(&paths.data_dir)?;
    let forms = select_forms(&dicts.forms, opts.form_type)?;
    let root_folder_id = opts
        .parent_folder_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(&cfg.drive.root_folder_id)
        .to_string();

    let plan = HarvestPlan {
        year,
        months,
        forms,
        organizations: dicts
            .associations
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect(),
        extra_excluded: cfg.portal.excluded_organizations.clone(),
        root_folder_id,
        pdf_root: paths.pdf_dir.clone(),
        routes: PortalRoutes::new(&cfg.portal.base_url),
        policy: cfg.portal.retry_policy(),
    };

    let mut report = CommandReport::new("harvest");
    report.detail(format!("year={}", plan.year));
    report.detail(format!(
        "months={}",
        plan.months
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    ));
    report.detail(format!("forms={}", plan.forms.len()));
    report.detail(format!("organizations={}", plan.organizations.len()));
    report.detail(format!("root_folder_id={}", plan.root_folder_id));
    report.detail(format!("pdf_dir={}", plan.pdf_root.display()));

    let lock = RunLock::acquire(&paths.logs_dir)?;
    tracing::debug!(lock = %lock.path().display(), "acquired run lock");

    let mut store = gdrive::connect(&paths, &cfg.drive)?;
    let mut session = ChromeSession::launch(paths.chrome_bin.as_deref(), &cfg.portal, &cfg.render)
        .context("browser session unavailable")?;

    let summary = run_harvest(&mut session, &mut store, &credentials, &plan)?;

    report.detail(format!("listings_visited={}", summary.listings_visited));
    report.detail(format!("empty_listings={}", summary.empty_listings));
    report.detail(format!("excluded_listings={}", summary.excluded_listings));
    report.detail(format!("identifiers_found={}", summary.identifiers_found));
    report.detail(format!("archived={}", summary.archived));
    report.detail(format!("skipped={}", summary.skipped.len()));
    for event in &summary.skipped {
        report.detail(event.line());
    }
    Ok(report)
}
