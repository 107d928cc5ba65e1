//! Semantic checks run by the engine before it accepts a configuration.
//!
//! Decoding only proves the document has the right shape. These checks cover
//! what serde cannot: tag references, required per-protocol fields and value
//! ranges. Every issue is collected so a caller sees the full list at once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inbound::Inbound;
use crate::options::Options;
use crate::outbound::{Outbound, OutboundKind};
use crate::{LOG_LEVELS, SHADOWSOCKS_METHODS};

/// One semantic problem, located by a dotted path into the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Rejection from the engine checker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("decode: {0}")]
    Decode(String),

    #[error("{}", format_issues(.0))]
    Invalid(Vec<Issue>),
}

impl CheckError {
    /// Issues found, empty for decode failures.
    pub fn issues(&self) -> &[Issue] {
        match self {
            CheckError::Decode(_) => &[],
            CheckError::Invalid(issues) => issues,
        }
    }
}

fn format_issues(issues: &[Issue]) -> String {
    let parts: Vec<String> = issues.iter().map(Issue::to_string).collect();
    format!("{} issue(s): {}", issues.len(), parts.join("; "))
}

/// Decode `text` as canonical options and run every semantic check.
pub fn check_config(text: &str) -> Result<(), CheckError> {
    let options = Options::from_text(text).map_err(|e| CheckError::Decode(e.to_string()))?;
    check_options(&options)
}

/// Run every semantic check on already-decoded options.
pub fn check_options(options: &Options) -> Result<(), CheckError> {
    let mut checker = Checker::default();
    checker.check_log(options);
    let tags = checker.check_outbounds(&options.outbounds);
    checker.check_inbounds(&options.inbounds);
    checker.check_route(options, &tags);
    checker.check_dns(options, &tags);

    if checker.issues.is_empty() {
        Ok(())
    } else {
        Err(CheckError::Invalid(checker.issues))
    }
}

#[derive(Default)]
struct Checker {
    issues: Vec<Issue>,
}

impl Checker {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue::new(path, message));
    }

    fn check_log(&mut self, options: &Options) {
        let Some(level) = options.log.as_ref().and_then(|l| l.level.as_deref()) else {
            return;
        };
        if !LOG_LEVELS.contains(&level) {
            self.push("log.level", format!("unknown log level '{}'", level));
        }
    }

    /// Checks outbounds and returns the set of declared tags.
    fn check_outbounds(&mut self, outbounds: &[Outbound]) -> HashSet<String> {
        let mut tags = HashSet::new();
        for (i, outbound) in outbounds.iter().enumerate() {
            if outbound.tag.is_empty() {
                continue;
            }
            if !tags.insert(outbound.tag.clone()) {
                self.push(
                    format!("outbounds[{}].tag", i),
                    format!("duplicate outbound tag '{}'", outbound.tag),
                );
            }
        }

        for (i, outbound) in outbounds.iter().enumerate() {
            let path = format!("outbounds[{}]", i);
            if outbound.kind.is_proxy() {
                self.check_proxy(&path, outbound);
            }
            if outbound.kind.is_group() {
                self.check_group(&path, outbound, &tags);
            }
            if let Some(detour) = &outbound.detour {
                if !tags.contains(detour) {
                    self.push(
                        format!("{}.detour", path),
                        format!("detour outbound '{}' not found", detour),
                    );
                }
            }
        }

        tags
    }

    fn check_proxy(&mut self, path: &str, outbound: &Outbound) {
        if outbound.server.as_deref().map_or(true, str::is_empty) {
            self.push(format!("{}.server", path), "missing server address");
        }
        match outbound.server_port {
            None | Some(0) => self.push(format!("{}.server_port", path), "missing server port"),
            Some(_) => {}
        }

        match outbound.kind {
            OutboundKind::Vmess | OutboundKind::Vless => match outbound.uuid.as_deref() {
                None => self.push(format!("{}.uuid", path), "missing uuid"),
                Some(id) if uuid::Uuid::parse_str(id).is_err() => {
                    self.push(format!("{}.uuid", path), format!("invalid uuid '{}'", id))
                }
                Some(_) => {}
            },
            OutboundKind::Shadowsocks => {
                match outbound.method.as_deref() {
                    None => self.push(format!("{}.method", path), "missing method"),
                    Some(method) if !SHADOWSOCKS_METHODS.contains(&method) => self.push(
                        format!("{}.method", path),
                        format!("unsupported method '{}'", method),
                    ),
                    Some(_) => {}
                }
                self.require_password(path, outbound);
            }
            OutboundKind::Trojan | OutboundKind::Hysteria2 => self.require_password(path, outbound),
            _ => {}
        }
    }

    fn require_password(&mut self, path: &str, outbound: &Outbound) {
        if outbound.password.as_deref().map_or(true, str::is_empty) {
            self.push(format!("{}.password", path), "missing password");
        }
    }

    fn check_group(&mut self, path: &str, outbound: &Outbound, tags: &HashSet<String>) {
        if outbound.outbounds.is_empty() {
            self.push(format!("{}.outbounds", path), "group has no members");
        }
        for (j, member) in outbound.outbounds.iter().enumerate() {
            if member == &outbound.tag {
                self.push(
                    format!("{}.outbounds[{}]", path, j),
                    "group cannot contain itself",
                );
            } else if !tags.contains(member) {
                self.push(
                    format!("{}.outbounds[{}]", path, j),
                    format!("member outbound '{}' not found", member),
                );
            }
        }
        if let Some(default) = &outbound.default {
            if !outbound.outbounds.contains(default) {
                self.push(
                    format!("{}.default", path),
                    format!("default '{}' is not a group member", default),
                );
            }
        }
    }

    fn check_inbounds(&mut self, inbounds: &[Inbound]) {
        let mut tags = HashSet::new();
        let mut ports: HashMap<(String, u16), usize> = HashMap::new();

        for (i, inbound) in inbounds.iter().enumerate() {
            let path = format!("inbounds[{}]", i);
            if let Some(tag) = &inbound.tag {
                if !tags.insert(tag.clone()) {
                    self.push(
                        format!("{}.tag", path),
                        format!("duplicate inbound tag '{}'", tag),
                    );
                }
            }

            if inbound.kind.needs_listen_port() {
                match inbound.listen_port {
                    None | Some(0) => {
                        self.push(format!("{}.listen_port", path), "missing listen port")
                    }
                    Some(port) => {
                        let listen = inbound.listen.clone().unwrap_or_default();
                        if let Some(first) = ports.insert((listen, port), i) {
                            self.push(
                                format!("{}.listen_port", path),
                                format!("port {} already used by inbounds[{}]", port, first),
                            );
                        }
                    }
                }
            }

            if inbound.kind == crate::InboundKind::Tun
                && inbound.inet4_address.is_empty()
                && inbound.inet6_address.is_empty()
            {
                self.push(
                    format!("{}.inet4_address", path),
                    "tun inbound needs an interface address",
                );
            }
        }
    }

    fn check_route(&mut self, options: &Options, tags: &HashSet<String>) {
        let Some(route) = &options.route else {
            return;
        };
        for (i, rule) in route.rules.iter().enumerate() {
            if !tags.contains(&rule.outbound) {
                self.push(
                    format!("route.rules[{}].outbound", i),
                    format!("outbound '{}' not found", rule.outbound),
                );
            }
        }
        if let Some(final_outbound) = &route.final_outbound {
            if !tags.contains(final_outbound) {
                self.push(
                    "route.final",
                    format!("outbound '{}' not found", final_outbound),
                );
            }
        }
    }

    fn check_dns(&mut self, options: &Options, tags: &HashSet<String>) {
        let Some(dns) = &options.dns else {
            return;
        };
        let servers: HashSet<&str> = dns.servers.iter().filter_map(|s| s.tag.as_deref()).collect();

        for (i, server) in dns.servers.iter().enumerate() {
            if server.address.is_empty() {
                self.push(format!("dns.servers[{}].address", i), "missing address");
            }
            if let Some(detour) = &server.detour {
                if !tags.contains(detour) {
                    self.push(
                        format!("dns.servers[{}].detour", i),
                        format!("outbound '{}' not found", detour),
                    );
                }
            }
            if let Some(resolver) = &server.address_resolver {
                if !servers.contains(resolver.as_str()) {
                    self.push(
                        format!("dns.servers[{}].address_resolver", i),
                        format!("dns server '{}' not found", resolver),
                    );
                }
            }
        }

        for (i, rule) in dns.rules.iter().enumerate() {
            if !servers.contains(rule.server.as_str()) {
                self.push(
                    format!("dns.rules[{}].server", i),
                    format!("dns server '{}' not found", rule.server),
                );
            }
        }

        if let Some(final_server) = &dns.final_server {
            if !servers.contains(final_server.as_str()) {
                self.push("dns.final", format!("dns server '{}' not found", final_server));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> &'static str {
        r#"{
            "log": {"level": "info"},
            "dns": {
                "servers": [
                    {"tag": "remote", "address": "tls://1.1.1.1", "address_resolver": "local", "detour": "select"},
                    {"tag": "local", "address": "223.5.5.5", "detour": "direct"}
                ],
                "rules": [{"outbound": "any", "server": "local"}],
                "final": "remote"
            },
            "inbounds": [{"type": "mixed", "tag": "mixed-in", "listen": "127.0.0.1", "listen_port": 2334}],
            "outbounds": [
                {"type": "selector", "tag": "select", "outbounds": ["trojan-1", "direct"], "default": "trojan-1"},
                {"type": "trojan", "tag": "trojan-1", "server": "example.com", "server_port": 443, "password": "pw"},
                {"type": "direct", "tag": "direct"}
            ],
            "route": {"rules": [{"domain_suffix": "cn", "outbound": "direct"}], "final": "select"}
        }"#
    }

    #[test]
    fn test_valid_config_passes() {
        check_config(valid_config()).unwrap();
    }

    #[test]
    fn test_decode_error() {
        let err = check_config("not json").unwrap_err();
        assert!(matches!(err, CheckError::Decode(_)));
        assert!(err.issues().is_empty());
    }

    #[test]
    fn test_array_documents_rejected() {
        for text in ["[]", "[null]", r#"{"log": []}"#, r#"{"route": [], "dns": [[]]}"#] {
            let err = check_config(text).unwrap_err();
            assert!(matches!(err, CheckError::Decode(_)), "{}", text);
        }
    }

    #[test]
    fn test_bad_log_level() {
        let err = check_config(r#"{"log": {"level": "loud"}}"#).unwrap_err();
        assert_eq!(err.issues()[0].path, "log.level");
    }

    #[test]
    fn test_duplicate_outbound_tags() {
        let err = check_config(
            r#"{"outbounds": [{"type": "direct", "tag": "a"}, {"type": "block", "tag": "a"}]}"#,
        )
        .unwrap_err();
        assert!(err.issues().iter().any(|i| i.message.contains("duplicate")));
    }

    #[test]
    fn test_proxy_missing_fields_all_reported() {
        let err = check_config(r#"{"outbounds": [{"type": "shadowsocks", "tag": "ss"}]}"#)
            .unwrap_err();
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"outbounds[0].server"));
        assert!(paths.contains(&"outbounds[0].server_port"));
        assert!(paths.contains(&"outbounds[0].method"));
        assert!(paths.contains(&"outbounds[0].password"));
    }

    #[test]
    fn test_invalid_uuid() {
        let err = check_config(
            r#"{"outbounds": [{"type": "vless", "tag": "v", "server": "h", "server_port": 1, "uuid": "nope"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.issues()[0].path, "outbounds[0].uuid");
    }

    #[test]
    fn test_unsupported_shadowsocks_method() {
        let err = check_config(
            r#"{"outbounds": [{"type": "shadowsocks", "tag": "s", "server": "h", "server_port": 1, "method": "rot13", "password": "p"}]}"#,
        )
        .unwrap_err();
        assert!(err.issues()[0].message.contains("rot13"));
    }

    #[test]
    fn test_group_member_missing() {
        let err = check_config(
            r#"{"outbounds": [{"type": "selector", "tag": "select", "outbounds": ["ghost"]}]}"#,
        )
        .unwrap_err();
        assert!(err.issues()[0].message.contains("ghost"));
    }

    #[test]
    fn test_selector_default_not_member() {
        let err = check_config(
            r#"{"outbounds": [
                {"type": "direct", "tag": "direct"},
                {"type": "selector", "tag": "select", "outbounds": ["direct"], "default": "block"}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(err.issues()[0].path, "outbounds[1].default");
    }

    #[test]
    fn test_route_references_checked() {
        let err = check_config(
            r#"{"outbounds": [{"type": "direct", "tag": "direct"}],
                "route": {"rules": [{"domain": "a.com", "outbound": "proxy"}], "final": "proxy"}}"#,
        )
        .unwrap_err();
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["route.rules[0].outbound", "route.final"]);
    }

    #[test]
    fn test_dns_references_checked() {
        let err = check_config(
            r#"{"dns": {"servers": [{"tag": "a", "address": "1.1.1.1", "detour": "proxy"}],
                        "rules": [{"domain": "x.com", "server": "b"}], "final": "c"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.issues().len(), 3);
    }

    #[test]
    fn test_inbound_port_conflict() {
        let err = check_config(
            r#"{"inbounds": [
                {"type": "mixed", "tag": "a", "listen": "127.0.0.1", "listen_port": 2334},
                {"type": "socks", "tag": "b", "listen": "127.0.0.1", "listen_port": 2334}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.issues()[0].message.contains("already used"));
    }

    #[test]
    fn test_tun_needs_address() {
        let err = check_config(r#"{"inbounds": [{"type": "tun", "tag": "tun-in"}]}"#).unwrap_err();
        assert_eq!(err.issues()[0].path, "inbounds[0].inet4_address");
    }

    #[test]
    fn test_error_display_lists_issues() {
        let err = check_config(r#"{"log": {"level": "loud"}}"#).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("1 issue(s)"));
        assert!(text.contains("log.level"));
    }
}
