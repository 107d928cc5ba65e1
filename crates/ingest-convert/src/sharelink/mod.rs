//! Share links and subscriptions into a complete canonical document.
//!
//! Accepted input:
//! - one link, or several separated by newlines;
//! - the base64 encoding of such a list (a subscription);
//! - a v2rayN vmess JSON object, or a JSON array of them.
//!
//! Every line must decode. One bad line fails the whole input.

mod encoding;
mod link;
mod vmess;

use std::collections::HashSet;
use std::sync::OnceLock;

use ingest_schema::{Inbound, InboundKind, Options, Outbound, RouteOptions, RouteRule};
use regex_lite::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::{AUTO_TAG, BLOCK_TAG, DIRECT_TAG, DNS_TAG, SELECT_TAG};

pub use encoding::{decode_base64, decode_base64_text, percent_decode};
pub use link::parse_link;

/// Probe target for the `auto` group.
pub const URLTEST_URL: &str = "https://www.gstatic.com/generate_204";

/// Probe interval for the `auto` group.
pub const URLTEST_INTERVAL: &str = "3m";

#[derive(Debug, Error)]
pub enum ShareLinkError {
    #[error("input contains no share links")]
    Empty,

    #[error("input is neither share links nor a base64 subscription")]
    Base64,

    #[error("not a share link: {0}")]
    NotALink(String),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("{scheme} link is missing {field}")]
    MissingField {
        scheme: &'static str,
        field: &'static str,
    },

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("vmess payload: {0}")]
    VmessPayload(String),

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<ShareLinkError>,
    },

    #[error("encode: {0}")]
    Encode(String),
}

/// One decoded link before tag assignment.
#[derive(Debug, Clone)]
pub struct ShareEntry {
    /// Short scheme name used for generated tags.
    pub scheme: &'static str,
    /// Display name carried by the link, if any.
    pub name: Option<String>,
    pub outbound: Outbound,
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("link pattern"))
}

/// Whether `line` looks like `scheme://...`.
pub fn looks_like_link(line: &str) -> bool {
    link_pattern().is_match(line.trim())
}

/// Convert share-link input into canonical JSON text.
pub fn convert(raw: &str) -> Result<String, ShareLinkError> {
    let proxies = decode(raw)?;
    let options = build_options(proxies);
    let bytes = options
        .to_vec_pretty()
        .map_err(|e| ShareLinkError::Encode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ShareLinkError::Encode(e.to_string()))
}

/// Decode share-link input into tagged proxy outbounds, in input order.
pub fn decode(raw: &str) -> Result<Vec<Outbound>, ShareLinkError> {
    let entries = expand(raw)?;
    if entries.is_empty() {
        return Err(ShareLinkError::Empty);
    }
    Ok(assign_tags(entries))
}

fn expand(raw: &str) -> Result<Vec<ShareEntry>, ShareLinkError> {
    let text = raw.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(ShareLinkError::Empty);
    }

    if text.starts_with('{') || text.starts_with('[') {
        return expand_json(text);
    }

    if first_line(text).is_some_and(looks_like_link) {
        return expand_lines(text);
    }

    let decoded = decode_base64_text(text).ok_or(ShareLinkError::Base64)?;
    match first_line(&decoded) {
        Some(line) if looks_like_link(line) => expand_lines(&decoded),
        _ => Err(ShareLinkError::Base64),
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

fn expand_lines(text: &str) -> Result<Vec<ShareEntry>, ShareLinkError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_link(line.trim()).map_err(|e| ShareLinkError::Line {
                line: i + 1,
                source: Box::new(e),
            })
        })
        .collect()
}

fn expand_json(text: &str) -> Result<Vec<ShareEntry>, ShareLinkError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ShareLinkError::VmessPayload(e.to_string()))?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                vmess::parse_vmess_value(item).map_err(|e| ShareLinkError::Line {
                    line: i + 1,
                    source: Box::new(e),
                })
            })
            .collect(),
        object @ Value::Object(_) => Ok(vec![vmess::parse_vmess_value(object)?]),
        _ => Err(ShareLinkError::VmessPayload(
            "expected a vmess object or an array of them".to_string(),
        )),
    }
}

/// Give every entry a unique tag: its name, or `<scheme>-<n>` when unnamed.
/// Collisions (including with the fixed group tags) get a ` #n` suffix.
fn assign_tags(entries: Vec<ShareEntry>) -> Vec<Outbound> {
    let mut used: HashSet<String> = [SELECT_TAG, AUTO_TAG, DIRECT_TAG, BLOCK_TAG, DNS_TAG]
        .iter()
        .map(|t| t.to_string())
        .collect();

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let base = entry
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| format!("{}-{}", entry.scheme, i + 1));
            let mut tag = base.clone();
            let mut n = 2;
            while used.contains(&tag) {
                tag = format!("{} #{}", base, n);
                n += 1;
            }
            used.insert(tag.clone());

            let mut outbound = entry.outbound;
            outbound.tag = tag;
            outbound
        })
        .collect()
}

/// Wrap decoded proxies into a runnable document: a local mixed listener,
/// `select` and `auto` groups, the built-in outbounds and a DNS hijack rule.
fn build_options(proxies: Vec<Outbound>) -> Options {
    let proxy_tags: Vec<String> = proxies.iter().map(|p| p.tag.clone()).collect();

    let mut select_members = vec![AUTO_TAG.to_string()];
    select_members.extend(proxy_tags.iter().cloned());
    select_members.push(DIRECT_TAG.to_string());

    let mut auto = Outbound::urltest(AUTO_TAG, proxy_tags);
    auto.url = Some(URLTEST_URL.to_string());
    auto.interval = Some(URLTEST_INTERVAL.to_string());

    let mut outbounds = proxies;
    outbounds.push(Outbound::selector(SELECT_TAG, select_members));
    outbounds.push(auto);
    outbounds.push(Outbound::direct(DIRECT_TAG));
    outbounds.push(Outbound::block(BLOCK_TAG));
    outbounds.push(Outbound::dns(DNS_TAG));

    let mut mixed = Inbound::listener(InboundKind::Mixed, "mixed-in", "127.0.0.1", 2334);
    mixed.sniff = Some(true);

    let mut dns_rule = RouteRule::to(DNS_TAG);
    dns_rule.protocol.push("dns".to_string());

    Options {
        inbounds: vec![mixed],
        outbounds,
        route: Some(RouteOptions {
            rules: vec![dns_rule],
            final_outbound: Some(SELECT_TAG.to_string()),
            auto_detect_interface: Some(true),
            ..RouteOptions::default()
        }),
        ..Options::default()
    }
}
