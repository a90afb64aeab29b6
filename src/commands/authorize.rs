use anyhow::Result;

use crate::commands::CommandReport;
use crate::gdrive;
use crate::harvest::config::load_config;
use crate::harvest::paths::resolve_paths;

pub fn run(force: bool) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.config_file)?;
    let mut report = CommandReport::new("authorize");
    report.detail(format!(
        "credentials_file={}",
        paths.drive_credentials_file.display()
    ));
    report.detail(format!("token_file={}", paths.drive_token_file.display()));

    if !paths.drive_credentials_file.exists() {
        report.issue(format!(
            "missing drive credentials {} (set HARVEST_DRIVE_CREDENTIALS)",
            paths.drive_credentials_file.display()
        ));
        return Ok(report);
    }

    let http = gdrive::http_client()?;
    gdrive::authorize(&paths, &cfg.drive, &http, force)?;
    report.detail(format!("scope={}", gdrive::oauth::DRIVE_SCOPE));
    report.detail("drive authorization ready");
    Ok(report)
}
