//! Inbound listeners.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::listable::Listable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundKind {
    Mixed,
    Socks,
    Http,
    Tun,
    Direct,
}

impl InboundKind {
    /// Whether this listener binds a local port.
    pub fn needs_listen_port(&self) -> bool {
        matches!(self, Self::Mixed | Self::Socks | Self::Http)
    }
}

impl fmt::Display for InboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mixed => "mixed",
            Self::Socks => "socks",
            Self::Http => "http",
            Self::Tun => "tun",
            Self::Direct => "direct",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundUser {
    pub username: String,
    pub password: String,
}

/// An inbound listener. Fields that do not apply to `kind` stay unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inbound {
    #[serde(rename = "type")]
    pub kind: InboundKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniff: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniff_override_destination: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_system_proxy: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<InboundUser>,

    // tun
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub inet4_address: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub inet6_address: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_route: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_route: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_independent_nat: Option<bool>,

    // direct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_port: Option<u16>,
}

impl Inbound {
    /// Local listener of `kind` on `listen:port`.
    pub fn listener(kind: InboundKind, tag: &str, listen: &str, port: u16) -> Self {
        Self {
            kind,
            tag: Some(tag.to_string()),
            listen: Some(listen.to_string()),
            listen_port: Some(port),
            sniff: None,
            sniff_override_destination: None,
            domain_strategy: None,
            set_system_proxy: None,
            users: Vec::new(),
            interface_name: None,
            inet4_address: Listable::new(),
            inet6_address: Listable::new(),
            mtu: None,
            auto_route: None,
            strict_route: None,
            stack: None,
            endpoint_independent_nat: None,
            override_address: None,
            override_port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tun_inbound_decodes() {
        let inbound: Inbound = serde_json::from_str(
            r#"{"type": "tun", "tag": "tun-in", "inet4_address": "172.19.0.1/30", "auto_route": true}"#,
        )
        .unwrap();
        assert_eq!(inbound.kind, InboundKind::Tun);
        assert_eq!(&*inbound.inet4_address, &["172.19.0.1/30".to_string()]);
        assert!(!inbound.kind.needs_listen_port());
    }

    #[test]
    fn test_unknown_inbound_kind_rejected() {
        let result: Result<Inbound, _> =
            serde_json::from_str(r#"{"type": "shadowsocks", "listen_port": 8388}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_listener_constructor() {
        let inbound = Inbound::listener(InboundKind::Mixed, "mixed-in", "127.0.0.1", 2334);
        let json = serde_json::to_value(&inbound).unwrap();
        assert_eq!(json["type"], "mixed");
        assert_eq!(json["listen_port"], 2334);
        assert!(json.get("users").is_none());
    }
}
