use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarvestPaths {
    pub harvest_home: PathBuf,
    pub pdf_dir: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
    pub drive_credentials_file: PathBuf,
    pub drive_token_file: PathBuf,
    pub chrome_bin: Option<PathBuf>,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    env_path(var).unwrap_or(fallback)
}

pub fn resolve_paths() -> Result<HarvestPaths> {
    let harvest_home = match env_path("HARVEST_HOME") {
        Some(home) => home,
        None => required_home_dir()?.join(".report-harvest"),
    };

    let pdf_dir = env_or_default_path("HARVEST_PDF_DIR", harvest_home.join("pdfs"));
    let data_dir = env_or_default_path("HARVEST_DATA_DIR", harvest_home.join("data"));
    let logs_dir = env_or_default_path("HARVEST_LOGS_DIR", harvest_home.join("logs"));
    let config_file = env_or_default_path("HARVEST_CONFIG_PATH", harvest_home.join("harvest.toml"));
    let drive_credentials_file = env_or_default_path(
        "HARVEST_DRIVE_CREDENTIALS",
        harvest_home.join("credentials.json"),
    );
    let drive_token_file =
        env_or_default_path("HARVEST_DRIVE_TOKEN", harvest_home.join("token.json"));
    let chrome_bin = env_path("HARVEST_CHROME_BIN");

    Ok(HarvestPaths {
        harvest_home,
        pdf_dir,
        data_dir,
        logs_dir,
        config_file,
        drive_credentials_file,
        drive_token_file,
        chrome_bin,
    })
}
