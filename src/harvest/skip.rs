use serde::Serialize;

use crate::error::HarvestError;

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() && ch != '=' {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One item the run gave up on, with enough context to re-run just that item.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SkipEvent {
    pub code: String,
    pub phase: String,
    pub organization: String,
    pub form: String,
    pub period: String,
    pub identifier: String,
    pub err: String,
}

impl SkipEvent {
    pub fn from_error(phase: &str, err: &HarvestError) -> Self {
        Self {
            code: err.code().as_str().to_string(),
            phase: phase.to_string(),
            err: err.to_string(),
            ..Self::default()
        }
    }

    pub fn line(&self) -> String {
        format!(
            "HARVEST_SKIP code={} phase={} org={} form={} period={} id={} err={}",
            sanitize_value(&self.code),
            sanitize_value(&self.phase),
            sanitize_value(&self.organization),
            sanitize_value(&self.form),
            sanitize_value(&self.period),
            sanitize_value(&self.identifier),
            sanitize_value(&self.err),
        )
    }
}

pub fn emit(event: &SkipEvent) {
    tracing::warn!("{}", event.line());
}
