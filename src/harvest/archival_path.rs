use std::path::{Path, PathBuf};

use crate::error::HarvestError;
use crate::harvest::period::month_label;

pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Where one (organization, form, period) lands: `[year, period, form, org]`.
///
/// The same inputs always produce the same segments, which is what lets the
/// remote folder chain be resolved rather than recreated on every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchivalPath {
    segments: Vec<String>,
}

impl ArchivalPath {
    pub fn new(
        year: i32,
        month: u32,
        form_label: &str,
        organization_label: &str,
    ) -> Result<Self, HarvestError> {
        Ok(Self {
            segments: vec![
                year.to_string(),
                month_label(month)?.to_string(),
                form_label.trim().to_string(),
                organization_label.trim().to_string(),
            ],
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Local directory for this path under `root`. Separators inside a
    /// segment are flattened so one segment stays one directory.
    pub fn local_dir(&self, root: &Path) -> PathBuf {
        self.segments
            .iter()
            .fold(root.to_path_buf(), |dir, seg| dir.join(flatten_separators(seg)))
    }

    pub fn local_file(&self, root: &Path, title: &str) -> PathBuf {
        self.local_dir(root)
            .join(format!("{title}.{DOCUMENT_EXTENSION}"))
    }

    /// Local file for `stem` that no earlier document occupies. A file left
    /// behind by a failed upload is never overwritten: the identifier, then a
    /// counter, is appended until the name is free.
    pub fn vacant_file(&self, root: &Path, stem: &str, identifier: &str) -> PathBuf {
        let plain = self.local_file(root, stem);
        if !plain.exists() {
            return plain;
        }
        let tagged = format!("{stem} ({})", flatten_separators(identifier.trim()));
        let mut candidate = self.local_file(root, &tagged);
        let mut n = 2;
        while candidate.exists() {
            candidate = self.local_file(root, &format!("{tagged} {n}"));
            n += 1;
        }
        candidate
    }

    pub fn display(&self) -> String {
        self.segments.join("/")
    }
}

fn flatten_separators(input: &str) -> String {
    input.replace(['/', '\\'], "_")
}

/// File stem for a rendered page: its title with path separators replaced,
/// or the identifier when the page has no title.
pub fn document_stem(title: &str, identifier: &str) -> String {
    let cleaned = flatten_separators(title.trim());
    if cleaned.trim().is_empty() {
        flatten_separators(identifier.trim())
    } else {
        cleaned
    }
}
