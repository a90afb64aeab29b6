pub mod chrome;

use anyhow::Result;
use std::path::Path;

use crate::error::HarvestError;
use crate::harvest::retry::{RetryPolicy, with_retry};

pub const EMAIL_INPUT: &str = "input[name=email]";
pub const PASSWORD_INPUT: &str = "input[name=password]";
pub const SUBMIT_BUTTON: &str = "button[type=submit]";

/// A single browser tab on the portal. One owner drives it step by step;
/// each call finishes before the next one starts.
pub trait PortalSession {
    /// Load `url` and wait for the page to settle.
    fn goto(&mut self, url: &str) -> Result<()>;

    fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    /// Click and wait for any navigation the click triggers.
    fn submit(&mut self, selector: &str) -> Result<()>;

    fn current_url(&mut self) -> Result<String>;

    fn title(&mut self) -> Result<String>;

    /// Text content of every `<td>` on the page, in document order.
    fn cell_texts(&mut self) -> Result<Vec<String>>;

    /// Print the current page to a PDF at `target`.
    fn render_pdf(&mut self, target: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PortalRoutes {
    base_url: String,
}

impl PortalRoutes {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn login(&self) -> String {
        format!("{}/login", self.base_url)
    }

    pub fn report_listing(&self, org_id: u32, form_id: u32, month: u32, year: i32) -> String {
        format!(
            "{}/report-pdf/{org_id}/{form_id}/{month}-{year}",
            self.base_url
        )
    }

    pub fn survey(&self, identifier: &str) -> String {
        format!("{}/survey-pdf/{identifier}", self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Navigate with the shared retry policy; a navigation that still fails is a
/// `NavigationTimeout` for whichever item owns it.
pub fn navigate<S>(session: &mut S, url: &str, policy: RetryPolicy) -> Result<(), HarvestError>
where
    S: PortalSession + ?Sized,
{
    with_retry(url, policy, || session.goto(url)).map_err(|exhausted| {
        HarvestError::NavigationTimeout {
            url: url.to_string(),
            attempts: exhausted.attempts,
            reason: format!("{:#}", exhausted.last_error),
        }
    })?;
    tracing::info!(url, "navigated");
    Ok(())
}

fn still_on_login(current: &str, login_url: &str) -> bool {
    let strip = |s: &str| {
        s.split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string()
    };
    strip(current) == strip(login_url)
}

/// Sign in through the portal's login form.
///
/// The portal answers a rejected login by showing the form again, so landing
/// back on the login route counts as rejected credentials.
pub fn login<S>(
    session: &mut S,
    routes: &PortalRoutes,
    credentials: &Credentials,
    policy: RetryPolicy,
) -> Result<(), HarvestError>
where
    S: PortalSession + ?Sized,
{
    let login_url = routes.login();
    navigate(session, &login_url, policy)
        .map_err(|err| HarvestError::Authentication(err.to_string()))?;

    let auth_err = |step: &str, err: anyhow::Error| {
        HarvestError::Authentication(format!("{step}: {err:#}"))
    };
    session
        .fill(EMAIL_INPUT, &credentials.email)
        .map_err(|err| auth_err("email field", err))?;
    session
        .fill(PASSWORD_INPUT, &credentials.password)
        .map_err(|err| auth_err("password field", err))?;
    session
        .submit(SUBMIT_BUTTON)
        .map_err(|err| auth_err("submit", err))?;

    let landed = session
        .current_url()
        .map_err(|err| auth_err("reading url after submit", err))?;
    if still_on_login(&landed, &login_url) {
        return Err(HarvestError::Authentication(
            "portal rejected the credentials".to_string(),
        ));
    }
    tracing::info!(landed = %landed, "logged in to the portal");
    Ok(())
}

#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;

    #[derive(Debug, Clone, Default)]
    pub struct ScriptedPage {
        pub title: String,
        pub cells: Vec<String>,
    }

    /// Fake portal tab: pages keyed by URL, optional failure counts per URL,
    /// and a fixed password that makes login succeed.
    #[derive(Debug, Default)]
    pub struct ScriptedSession {
        pub pages: BTreeMap<String, ScriptedPage>,
        pub failures_left: BTreeMap<String, usize>,
        pub render_fails: BTreeSet<String>,
        pub visited: Vec<String>,
        pub accepted_password: String,
        current: String,
        typed_password: String,
    }

    impl ScriptedSession {
        pub fn page(mut self, url: &str, title: &str, cells: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                ScriptedPage {
                    title: title.to_string(),
                    cells: cells.iter().map(|c| c.to_string()).collect(),
                },
            );
            self
        }

        pub fn accepting(password: &str) -> Self {
            Self {
                accepted_password: password.to_string(),
                ..Self::default()
            }
        }

        pub fn failing(mut self, url: &str, times: usize) -> Self {
            self.failures_left.insert(url.to_string(), times);
            self
        }

        pub fn unprintable(mut self, url: &str) -> Self {
            self.render_fails.insert(url.to_string());
            self
        }
    }

    impl PortalSession for ScriptedSession {
        fn goto(&mut self, url: &str) -> Result<()> {
            self.visited.push(url.to_string());
            if let Some(left) = self.failures_left.get_mut(url)
                && *left > 0
            {
                *left -= 1;
                anyhow::bail!("navigation timed out");
            }
            self.current = url.to_string();
            Ok(())
        }

        fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
            if selector == PASSWORD_INPUT {
                self.typed_password = value.to_string();
            }
            Ok(())
        }

        fn submit(&mut self, _selector: &str) -> Result<()> {
            if self.typed_password == self.accepted_password {
                self.current = self.current.replace("/login", "/home");
            }
            Ok(())
        }

        fn current_url(&mut self) -> Result<String> {
            Ok(self.current.clone())
        }

        fn title(&mut self) -> Result<String> {
            Ok(self
                .pages
                .get(&self.current)
                .map(|p| p.title.clone())
                .unwrap_or_default())
        }

        fn cell_texts(&mut self) -> Result<Vec<String>> {
            Ok(self
                .pages
                .get(&self.current)
                .map(|p| p.cells.clone())
                .unwrap_or_default())
        }

        fn render_pdf(&mut self, target: &Path) -> Result<()> {
            if self.render_fails.contains(&self.current) {
                anyhow::bail!("printToPDF failed");
            }
            fs::write(target, format!("%PDF-1.4 {}\n", self.current))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedSession;
    use super::*;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::navigation(Duration::ZERO)
    }

    fn creds(password: &str) -> Credentials {
        Credentials {
            email: "ops@example.org".into(),
            password: password.into(),
        }
    }

    #[test]
    fn routes_match_portal_layout() {
        let routes = PortalRoutes::new("https://portal.example.org/");
        assert_eq!(routes.login(), "https://portal.example.org/login");
        assert_eq!(
            routes.report_listing(6, 2, 3, 2024),
            "https://portal.example.org/report-pdf/6/2/3-2024"
        );
        assert_eq!(
            routes.survey("12/2024"),
            "https://portal.example.org/survey-pdf/12/2024"
        );
    }

    #[test]
    fn navigate_retries_once_then_fails() {
        let url = "https://portal.example.org/survey-pdf/1/2";
        let mut session = ScriptedSession::default().failing(url, 1);
        navigate(&mut session, url, policy()).expect("second attempt succeeds");

        let mut session = ScriptedSession::default().failing(url, 5);
        let err = navigate(&mut session, url, policy()).unwrap_err();
        match err {
            HarvestError::NavigationTimeout { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.visited.len(), 2);
    }

    #[test]
    fn login_accepts_valid_credentials() {
        let routes = PortalRoutes::new("https://portal.example.org");
        let mut session = ScriptedSession::accepting("s3cret");
        login(&mut session, &routes, &creds("s3cret"), policy()).expect("login");
    }

    #[test]
    fn login_rejected_when_form_comes_back() {
        let routes = PortalRoutes::new("https://portal.example.org");
        let mut session = ScriptedSession::accepting("s3cret");
        let err = login(&mut session, &routes, &creds("wrong"), policy()).unwrap_err();
        assert!(matches!(err, HarvestError::Authentication(_)));
    }

    #[test]
    fn login_page_unreachable_is_authentication_failure() {
        let routes = PortalRoutes::new("https://portal.example.org");
        let mut session = ScriptedSession::default().failing(&routes.login(), 2);
        let err = login(&mut session, &routes, &creds("x"), policy()).unwrap_err();
        assert!(matches!(err, HarvestError::Authentication(_)));
    }

    #[test]
    fn login_url_comparison_ignores_query_and_slash() {
        assert!(still_on_login(
            "https://p.org/login/?error=1",
            "https://p.org/login"
        ));
        assert!(!still_on_login("https://p.org/home", "https://p.org/login"));
    }
}
