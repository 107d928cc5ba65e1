//! Rule-routing YAML documents into a [`Fragment`].
//!
//! The fragment holds the document's proxies, groups and rules translated to
//! canonical outbounds and route rules. It carries no inbounds, DNS or log
//! settings; those come from the template it is merged into.

mod doc;
mod proxy;
mod rule;

use std::collections::{HashMap, HashSet};

use ingest_schema::{Outbound, OutboundKind};
use thiserror::Error;

use crate::{Fragment, BLOCK_TAG, DIRECT_TAG, SELECT_TAG};

pub use doc::{ClashProxy, NumberOrText, ProxyGroup, RuleDoc};
pub use proxy::convert_proxy;

/// Default probe target for url-test groups that do not set one.
pub const DEFAULT_TEST_URL: &str = "https://www.gstatic.com/generate_204";

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no convertible proxies")]
    NoProxies,

    #[error("proxy '{name}': {reason}")]
    Proxy { name: String, reason: String },

    #[error("duplicate proxy or group name '{0}'")]
    DuplicateName(String),

    #[error("group '{0}' has no usable members")]
    EmptyGroup(String),

    #[error("{context}: unknown target '{target}'")]
    UnknownTarget { context: String, target: String },

    #[error("rules[{index}] '{rule}': {reason}")]
    Rule {
        index: usize,
        rule: String,
        reason: String,
    },
}

/// Parse YAML bytes into the rule-routing model.
///
/// Fails on anything that is not a mapping with a `proxies` key.
pub fn deserialize(raw: &[u8]) -> Result<RuleDoc, RulesError> {
    Ok(serde_yaml::from_slice(raw)?)
}

/// Names a rule or group may point at, mapped to canonical tags.
struct Targets {
    tags: HashMap<String, String>,
    skipped: HashSet<String>,
}

impl Targets {
    fn new() -> Self {
        let tags = [("DIRECT", DIRECT_TAG), ("REJECT", BLOCK_TAG), ("REJECT-DROP", BLOCK_TAG)]
            .into_iter()
            .map(|(name, tag)| (name.to_string(), tag.to_string()))
            .collect();
        Self {
            tags,
            skipped: HashSet::new(),
        }
    }

    fn define(&mut self, name: &str) -> Result<(), RulesError> {
        if self.tags.contains_key(name) || self.skipped.contains(name) {
            return Err(RulesError::DuplicateName(name.to_string()));
        }
        self.tags.insert(name.to_string(), name.to_string());
        Ok(())
    }

    fn skip(&mut self, name: &str) {
        self.skipped.insert(name.to_string());
    }

    fn resolve(&self, name: &str) -> Option<String> {
        self.tags.get(name).cloned()
    }
}

/// Translate a parsed document into a fragment.
pub fn to_fragment(doc: &RuleDoc) -> Result<Fragment, RulesError> {
    let mut targets = Targets::new();

    let mut proxies = Vec::new();
    for proxy in &doc.proxies {
        match convert_proxy(proxy)? {
            Some(outbound) => {
                targets.define(&proxy.name)?;
                proxies.push(outbound);
            }
            None => {
                tracing::warn!(proxy = %proxy.name, kind = %proxy.kind, "unsupported proxy type skipped");
                targets.skip(&proxy.name);
            }
        }
    }
    if proxies.is_empty() {
        return Err(RulesError::NoProxies);
    }

    // Groups can reference each other, so every name is defined before any
    // member list is resolved.
    let mut kept_groups = Vec::new();
    for group in &doc.proxy_groups {
        match group_kind(&group.kind) {
            Some(kind) => {
                targets.define(&group.name)?;
                kept_groups.push((group, kind));
            }
            None => {
                tracing::warn!(group = %group.name, kind = %group.kind, "unsupported group type skipped");
                targets.skip(&group.name);
            }
        }
    }

    let mut groups = Vec::new();
    for (group, kind) in kept_groups {
        groups.push(convert_group(group, kind, &targets)?);
    }

    let has_select = groups.iter().chain(proxies.iter()).any(|o| o.tag == SELECT_TAG);
    let mut outbounds = Vec::with_capacity(groups.len() + proxies.len() + 1);
    if !has_select {
        let members = groups
            .iter()
            .chain(proxies.iter())
            .map(|o| o.tag.clone())
            .collect();
        outbounds.push(Outbound::selector(SELECT_TAG, members));
    }
    outbounds.extend(groups);
    outbounds.extend(proxies);

    let translated = rule::translate_rules(&doc.rules, |name| targets.resolve(name))?;

    Ok(Fragment {
        outbounds,
        rules: translated.rules,
        final_outbound: translated.final_outbound,
    })
}

fn group_kind(kind: &str) -> Option<OutboundKind> {
    match kind {
        "select" => Some(OutboundKind::Selector),
        "url-test" | "fallback" | "load-balance" => Some(OutboundKind::Urltest),
        _ => None,
    }
}

fn convert_group(
    group: &ProxyGroup,
    kind: OutboundKind,
    targets: &Targets,
) -> Result<Outbound, RulesError> {
    let mut members = Vec::with_capacity(group.proxies.len());
    for name in &group.proxies {
        if targets.skipped.contains(name) {
            tracing::debug!(group = %group.name, member = %name, "dropping skipped member");
            continue;
        }
        let tag = targets.resolve(name).ok_or_else(|| RulesError::UnknownTarget {
            context: format!("group '{}'", group.name),
            target: name.clone(),
        })?;
        if tag == group.name {
            return Err(RulesError::UnknownTarget {
                context: format!("group '{}'", group.name),
                target: name.clone(),
            });
        }
        if !members.contains(&tag) {
            members.push(tag);
        }
    }
    if members.is_empty() {
        return Err(RulesError::EmptyGroup(group.name.clone()));
    }

    let outbound = match kind {
        OutboundKind::Selector => Outbound::selector(group.name.clone(), members),
        _ => {
            let mut urltest = Outbound::urltest(group.name.clone(), members);
            urltest.url = Some(
                group
                    .url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEST_URL.to_string()),
            );
            urltest.interval = group.interval.map(|secs| format!("{}s", secs));
            urltest.tolerance = group.tolerance;
            urltest
        }
    };
    Ok(outbound)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
port: 7890
mode: rule
proxies:
  - {name: HK, type: ss, server: hk.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
  - {name: JP, type: trojan, server: jp.example.com, port: 443, password: pw, sni: jp.example.com}
  - {name: WG, type: wireguard, server: wg.example.com, port: 51820}
proxy-groups:
  - {name: Proxy, type: select, proxies: [Auto, HK, JP, WG, DIRECT]}
  - {name: Auto, type: url-test, proxies: [HK, JP], url: 'http://cp.cloudflare.com', interval: 300}
rules:
  - DOMAIN-SUFFIX,google.com,Proxy
  - DOMAIN-SUFFIX,youtube.com,Proxy
  - IP-CIDR,10.0.0.0/8,DIRECT,no-resolve
  - DOMAIN,ads.example.com,REJECT
  - MATCH,Proxy
"#;

    fn fragment(yaml: &str) -> Result<Fragment, RulesError> {
        to_fragment(&deserialize(yaml.as_bytes())?)
    }

    #[test]
    fn test_profile_translates() {
        let fragment = fragment(PROFILE).unwrap();
        let tags: Vec<_> = fragment.tags().collect();
        assert_eq!(tags, vec!["select", "Proxy", "Auto", "HK", "JP"]);

        let select = &fragment.outbounds[0];
        assert_eq!(select.outbounds, vec!["Proxy", "Auto", "HK", "JP"]);

        let proxy_group = &fragment.outbounds[1];
        assert_eq!(proxy_group.outbounds, vec!["Auto", "HK", "JP", "direct"]);

        let auto = &fragment.outbounds[2];
        assert_eq!(auto.kind, OutboundKind::Urltest);
        assert_eq!(auto.interval.as_deref(), Some("300s"));

        assert_eq!(fragment.rules.len(), 3);
        assert_eq!(fragment.rules[2].outbound, "block");
        assert_eq!(fragment.final_outbound.as_deref(), Some("Proxy"));
    }

    #[test]
    fn test_existing_select_group_is_kept() {
        let yaml = r#"
proxies:
  - {name: HK, type: ss, server: hk.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
proxy-groups:
  - {name: select, type: select, proxies: [HK, DIRECT]}
"#;
        let fragment = fragment(yaml).unwrap();
        assert_eq!(fragment.tags().filter(|t| *t == SELECT_TAG).count(), 1);
        assert_eq!(fragment.outbounds[0].outbounds, vec!["HK", "direct"]);
    }

    #[test]
    fn test_proxies_key_required() {
        assert!(matches!(deserialize(b"rules: []\n"), Err(RulesError::Yaml(_))));
        assert!(matches!(deserialize(b"{\"outbounds\": []}"), Err(RulesError::Yaml(_))));
        assert!(deserialize(b"vmess://abc").is_err());
    }

    #[test]
    fn test_nothing_convertible() {
        let yaml = "proxies:\n  - {name: WG, type: wireguard, server: a, port: 1}\n";
        assert!(matches!(fragment(yaml), Err(RulesError::NoProxies)));
        assert!(matches!(fragment("proxies: []\n"), Err(RulesError::NoProxies)));
    }

    #[test]
    fn test_rule_to_unknown_group_fails() {
        let yaml = r#"
proxies:
  - {name: HK, type: ss, server: hk.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
rules:
  - DOMAIN,a.com,Streaming
"#;
        assert!(matches!(fragment(yaml), Err(RulesError::UnknownTarget { .. })));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
proxies:
  - {name: HK, type: ss, server: a.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
  - {name: HK, type: ss, server: b.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
"#;
        assert!(matches!(fragment(yaml), Err(RulesError::DuplicateName(n)) if n == "HK"));
    }

    #[test]
    fn test_group_of_only_skipped_members() {
        let yaml = r#"
proxies:
  - {name: HK, type: ss, server: a.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
  - {name: WG, type: wireguard, server: wg.example.com, port: 51820}
proxy-groups:
  - {name: Tunnel, type: select, proxies: [WG]}
"#;
        assert!(matches!(fragment(yaml), Err(RulesError::EmptyGroup(n)) if n == "Tunnel"));
    }
}
