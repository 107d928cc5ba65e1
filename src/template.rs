//! Embedded baseline template and the fragment merger
//!
//! The template is compiled into the binary and parsed once per process.
//! Merging always works on a clone, so the shared template is never mutated.

use std::collections::HashSet;
use std::sync::OnceLock;

use ingest_convert::Fragment;
use ingest_schema::{Options, RouteOptions};
use serde_json::Value;
use thiserror::Error;

use crate::config::deep_merge;

const TEMPLATE_SOURCE: &str = include_str!("../assets/config.json.template");

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("embedded template is invalid: {0}")]
    Template(String),

    #[error("outbound tag '{0}' is already defined by the template")]
    ConflictingTag(String),

    #[error("overrides produce a non-canonical document: {0}")]
    Overrides(String),

    #[error("encode: {0}")]
    Encode(String),
}

/// A baseline canonical document.
#[derive(Debug, Clone)]
pub struct Template {
    options: Options,
}

impl Template {
    /// The process-wide embedded template.
    pub fn global() -> Result<&'static Template, MergeError> {
        static GLOBAL: OnceLock<Result<Template, MergeError>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Template::from_text(TEMPLATE_SOURCE))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Parse a template. It must be structurally canonical.
    pub fn from_text(text: &str) -> Result<Self, MergeError> {
        let options = Options::from_text(text).map_err(|e| MergeError::Template(e.to_string()))?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn outbound_tags(&self) -> impl Iterator<Item = &str> {
        self.options.outbounds.iter().map(|o| o.tag.as_str())
    }
}

/// Per-invocation adjustments deep-merged over the merged document.
/// Empty unless a caller sets them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOverrides {
    value: Option<Value>,
}

impl MergeOverrides {
    pub fn new(value: Value) -> Self {
        Self { value: Some(value) }
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            None => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }
}

/// Splices fragments into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMerger;

impl TemplateMerger {
    /// Produce a fresh canonical document from `template` and `fragment`.
    ///
    /// - fragment outbounds come first, then the template's;
    /// - a fragment tag already used by the template is an error;
    /// - template route rules come first, then the fragment's;
    /// - the fragment's final outbound replaces the template's when set;
    /// - non-empty overrides are deep-merged last.
    pub fn merge(
        &self,
        template: &Template,
        fragment: &Fragment,
        overrides: &MergeOverrides,
    ) -> Result<Vec<u8>, MergeError> {
        let reserved: HashSet<&str> = template.outbound_tags().collect();
        if let Some(tag) = fragment.tags().find(|t| reserved.contains(t)) {
            return Err(MergeError::ConflictingTag(tag.to_string()));
        }

        let mut options = template.options().clone();

        let mut outbounds = fragment.outbounds.clone();
        outbounds.append(&mut options.outbounds);
        options.outbounds = outbounds;

        let route = options.route.get_or_insert_with(RouteOptions::default);
        route.rules.extend(fragment.rules.iter().cloned());
        if let Some(final_outbound) = &fragment.final_outbound {
            route.final_outbound = Some(final_outbound.clone());
        }

        if !overrides.is_empty() {
            options = apply_overrides(&options, overrides)?;
        }

        options
            .to_vec_pretty()
            .map_err(|e| MergeError::Encode(e.to_string()))
    }
}

fn apply_overrides(options: &Options, overrides: &MergeOverrides) -> Result<Options, MergeError> {
    let Some(overlay) = overrides.value.clone() else {
        return Ok(options.clone());
    };
    let base = serde_json::to_value(options).map_err(|e| MergeError::Encode(e.to_string()))?;
    let merged = deep_merge(base, overlay);
    serde_json::from_value(merged).map_err(|e| MergeError::Overrides(e.to_string()))
}
