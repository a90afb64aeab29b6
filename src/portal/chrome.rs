use anyhow::{Context, Result, anyhow};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::harvest::config::{PortalConfig, RenderConfig};
use crate::portal::PortalSession;

const CHROME_CANDIDATES: [&str; 4] = ["google-chrome", "chromium", "chromium-browser", "chrome"];
const WAIT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);
// Uploads run between browser steps; chrome must outlive the slowest of them.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const CELL_TEXTS_JS: &str = "JSON.stringify(Array.from(document.querySelectorAll('td')).map(td => (td.textContent || '').trim()))";

fn resolve_chrome_bin(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    CHROME_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Headless Chrome tab driving the portal.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
    render: RenderConfig,
}

impl ChromeSession {
    pub fn launch(
        chrome_bin: Option<&Path>,
        portal: &PortalConfig,
        render: &RenderConfig,
    ) -> Result<Self> {
        let path = resolve_chrome_bin(chrome_bin);
        let options = LaunchOptions::default_builder()
            .headless(render.headless)
            .path(path.clone())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|err| anyhow!("invalid chrome launch options: {err}"))?;
        let browser = Browser::new(options).with_context(|| match &path {
            Some(p) => format!("failed to launch chrome at {}", p.display()),
            None => "failed to launch chrome (set HARVEST_CHROME_BIN)".to_string(),
        })?;
        let tab = browser.new_tab().context("failed to open a chrome tab")?;
        tab.set_default_timeout(portal.navigation_timeout());
        tracing::info!(
            chrome = %path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "auto".into()),
            headless = render.headless,
            "launched browser"
        );
        Ok(Self {
            _browser: browser,
            tab,
            render: render.clone(),
        })
    }

    fn pdf_options(&self) -> PrintToPdfOptions {
        PrintToPdfOptions {
            paper_width: Some(self.render.paper_width_in),
            paper_height: Some(self.render.paper_height_in),
            print_background: Some(self.render.print_background),
            ..Default::default()
        }
    }
}

impl PortalSession for ChromeSession {
    fn goto(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("failed to open {url}"))?
            .wait_until_navigated()
            .with_context(|| format!("timed out loading {url}"))?;
        Ok(())
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        self.tab
            .wait_for_element(selector)
            .with_context(|| format!("element `{selector}` not found"))?
            .click()?;
        self.tab.type_str(value)?;
        Ok(())
    }

    fn submit(&mut self, selector: &str) -> Result<()> {
        self.tab
            .wait_for_element(selector)
            .with_context(|| format!("element `{selector}` not found"))?
            .click()?;
        self.tab
            .wait_until_navigated()
            .context("timed out waiting for navigation after submit")?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    fn title(&mut self) -> Result<String> {
        self.tab.get_title().context("failed to read page title")
    }

    fn cell_texts(&mut self) -> Result<Vec<String>> {
        let result = self
            .tab
            .evaluate(CELL_TEXTS_JS, false)
            .context("failed to read table cells")?;
        let Some(Value::String(raw)) = result.value else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).context("table cell payload was not a string array")
    }

    fn render_pdf(&mut self, target: &Path) -> Result<()> {
        if let Some(selector) = self.render.wait_selector.as_deref()
            && let Err(err) = self
                .tab
                .wait_for_element_with_custom_timeout(selector, WAIT_SELECTOR_TIMEOUT)
        {
            tracing::debug!(selector, error = %err, "render wait selector not found; printing anyway");
        }
        let bytes = self
            .tab
            .print_to_pdf(Some(self.pdf_options()))
            .context("chrome failed to print the page")?;
        fs::write(target, &bytes).with_context(|| format!("failed to write {}", target.display()))?;
        tracing::info!(path = %target.display(), bytes = bytes.len(), "saved pdf");
        Ok(())
    }
}
