use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::error::HarvestError;
use crate::harvest::archival_path::{ArchivalPath, document_stem};
use crate::harvest::dictionaries::is_excluded;
use crate::harvest::extract::extract_identifiers;
use crate::harvest::folders::resolve_folder_chain;
use crate::harvest::local_fs::ensure_parent_dir;
use crate::harvest::period::month_label;
use crate::harvest::retry::RetryPolicy;
use crate::harvest::skip::{self, SkipEvent};
use crate::harvest::store::RemoteStore;
use crate::harvest::uploader::upload_and_clean;
use crate::portal::{self, Credentials, PortalRoutes, PortalSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    ListingReports,
    ExtractingIdentifiers,
    RenderingSurvey,
    Archiving,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::LoggingIn => "logging_in",
            Self::LoggedIn => "logged_in",
            Self::ListingReports => "listing_reports",
            Self::ExtractingIdentifiers => "extracting_identifiers",
            Self::RenderingSurvey => "rendering_survey",
            Self::Archiving => "archiving",
            Self::Done => "done",
        }
    }
}

/// Everything a run iterates over, resolved before the browser starts.
#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub year: i32,
    pub months: Vec<u32>,
    pub forms: Vec<(u32, String)>,
    pub organizations: Vec<(u32, String)>,
    pub extra_excluded: BTreeSet<u32>,
    pub root_folder_id: String,
    pub pdf_root: PathBuf,
    pub routes: PortalRoutes,
    pub policy: RetryPolicy,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub listings_visited: usize,
    pub empty_listings: usize,
    pub excluded_listings: usize,
    pub identifiers_found: usize,
    pub archived: usize,
    pub skipped: Vec<SkipEvent>,
}

struct Listing<'a> {
    org_id: u32,
    org: &'a str,
    form_id: u32,
    form: &'a str,
    month: u32,
    period: String,
}

impl Listing<'_> {
    fn skip_event(&self, phase: Phase, identifier: &str, err: &HarvestError) -> SkipEvent {
        SkipEvent {
            organization: self.org.to_string(),
            form: self.form.to_string(),
            period: self.period.clone(),
            identifier: identifier.to_string(),
            ..SkipEvent::from_error(phase.as_str(), err)
        }
    }
}

struct Harvester<'a, S: ?Sized, R: ?Sized> {
    session: &'a mut S,
    store: &'a mut R,
    plan: &'a HarvestPlan,
    phase: Phase,
    folder_cache: HashMap<ArchivalPath, String>,
    summary: HarvestSummary,
}

impl<S, R> Harvester<'_, S, R>
where
    S: PortalSession + ?Sized,
    R: RemoteStore + ?Sized,
{
    fn enter(&mut self, next: Phase) {
        tracing::info!(from = self.phase.as_str(), phase = next.as_str(), "phase transition");
        self.phase = next;
    }

    fn skip(&mut self, listing: &Listing<'_>, identifier: &str, err: &HarvestError) {
        let event = listing.skip_event(self.phase, identifier, err);
        skip::emit(&event);
        self.summary.skipped.push(event);
    }

    fn login(&mut self, credentials: &Credentials) -> Result<(), HarvestError> {
        self.enter(Phase::LoggingIn);
        portal::login(self.session, &self.plan.routes, credentials, self.plan.policy)?;
        self.enter(Phase::LoggedIn);
        Ok(())
    }

    fn run(&mut self) -> Result<(), HarvestError> {
        let plan = self.plan;
        for &month in &plan.months {
            let period = format!("{}-{}", month_label(month)?, plan.year);
            for (form_id, form) in &plan.forms {
                for (org_id, org) in &plan.organizations {
                    if is_excluded(*org_id, &plan.extra_excluded) {
                        tracing::info!(org_id, org = %org, form = %form, period = %period, "organization excluded by configuration");
                        self.summary.excluded_listings += 1;
                        continue;
                    }
                    let listing = Listing {
                        org_id: *org_id,
                        org,
                        form_id: *form_id,
                        form,
                        month,
                        period: period.clone(),
                    };
                    self.harvest_listing(&listing)?;
                }
            }
        }
        self.enter(Phase::Done);
        Ok(())
    }

    /// Per-item failures are recorded and skipped; only fatal errors return.
    fn harvest_listing(&mut self, listing: &Listing<'_>) -> Result<(), HarvestError> {
        self.enter(Phase::ListingReports);
        let url = self.plan.routes.report_listing(
            listing.org_id,
            listing.form_id,
            listing.month,
            self.plan.year,
        );
        tracing::info!(org = listing.org, form = listing.form, period = %listing.period, "listing reports");
        if let Err(err) = portal::navigate(self.session, &url, self.plan.policy) {
            self.skip(listing, "", &err);
            return Ok(());
        }
        self.summary.listings_visited += 1;

        self.enter(Phase::ExtractingIdentifiers);
        let cells = match self.session.cell_texts() {
            Ok(cells) => cells,
            Err(err) => {
                tracing::warn!(url = %url, error = %format!("{err:#}"), "could not read listing table");
                Vec::new()
            }
        };
        let identifiers = extract_identifiers(&cells);
        if identifiers.is_empty() {
            tracing::info!(url = %url, cells = cells.len(), "no reports listed");
            self.summary.empty_listings += 1;
            return Ok(());
        }
        tracing::info!(url = %url, count = identifiers.len(), "found reports");
        self.summary.identifiers_found += identifiers.len();

        let archival = ArchivalPath::new(self.plan.year, listing.month, listing.form, listing.org)?;
        for identifier in &identifiers {
            match self.harvest_identifier(&archival, identifier) {
                Ok(()) => self.summary.archived += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => self.skip(listing, identifier, &err),
            }
        }
        Ok(())
    }

    fn harvest_identifier(&mut self, archival: &ArchivalPath, identifier: &str) -> Result<(), HarvestError> {
        self.enter(Phase::RenderingSurvey);
        let url = self.plan.routes.survey(identifier);
        portal::navigate(self.session, &url, self.plan.policy)?;
        let title = self.session.title().unwrap_or_else(|err| {
            tracing::debug!(url = %url, error = %format!("{err:#}"), "page title unavailable");
            String::new()
        });
        let local = archival.vacant_file(
            &self.plan.pdf_root,
            &document_stem(&title, identifier),
            identifier,
        );

        self.enter(Phase::Archiving);
        ensure_parent_dir(&local)?;
        self.session
            .render_pdf(&local)
            .map_err(|err| HarvestError::Render {
                url: url.clone(),
                reason: format!("{err:#}"),
            })?;
        let folder_id = self.folder_for(archival)?;
        upload_and_clean(self.store, &local, &folder_id)?;
        Ok(())
    }

    fn folder_for(&mut self, archival: &ArchivalPath) -> Result<String, HarvestError> {
        if let Some(id) = self.folder_cache.get(archival) {
            return Ok(id.clone());
        }
        let id = resolve_folder_chain(self.store, &self.plan.root_folder_id, archival.segments())?;
        tracing::info!(path = %archival.display(), id = %id, "resolved remote folder");
        self.folder_cache.insert(archival.clone(), id.clone());
        Ok(id)
    }
}

/// Log in, then walk months × forms × organizations in that nesting order,
/// archiving every listed report. Only a failed login or a bad month ends
/// the run early; every other failure is recorded in the summary and the
/// walk moves on.
pub fn run_harvest<S, R>(
    session: &mut S,
    store: &mut R,
    credentials: &Credentials,
    plan: &HarvestPlan,
) -> Result<HarvestSummary, HarvestError>
where
    S: PortalSession + ?Sized,
    R: RemoteStore + ?Sized,
{
    let mut harvester = Harvester {
        session,
        store,
        plan,
        phase: Phase::LoggedOut,
        folder_cache: HashMap::new(),
        summary: HarvestSummary::default(),
    };
    harvester.login(credentials)?;
    harvester.run()?;
    let summary = harvester.summary;
    tracing::info!(
        listings = summary.listings_visited,
        empty = summary.empty_listings,
        identifiers = summary.identifiers_found,
        archived = summary.archived,
        skipped = summary.skipped.len(),
        "harvest finished"
    );
    Ok(summary)
}
