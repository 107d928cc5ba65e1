//! Outbounds: proxies, groups and the built-in direct/block/dns targets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::listable::Listable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundKind {
    #[default]
    Direct,
    Block,
    Dns,
    Selector,
    Urltest,
    Socks,
    Http,
    Shadowsocks,
    Vmess,
    Vless,
    Trojan,
    Hysteria2,
}

impl OutboundKind {
    /// Outbounds that dial a remote server.
    pub fn is_proxy(&self) -> bool {
        matches!(
            self,
            Self::Socks
                | Self::Http
                | Self::Shadowsocks
                | Self::Vmess
                | Self::Vless
                | Self::Trojan
                | Self::Hysteria2
        )
    }

    /// Outbounds that delegate to member outbounds.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Selector | Self::Urltest)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Block => "block",
            Self::Dns => "dns",
            Self::Selector => "selector",
            Self::Urltest => "urltest",
            Self::Socks => "socks",
            Self::Http => "http",
            Self::Shadowsocks => "shadowsocks",
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Hysteria2 => "hysteria2",
        }
    }
}

impl fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtlsOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealityOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub alpn: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utls: Option<UtlsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<RealityOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Ws,
    Quic,
    Grpc,
    Httpupgrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportOptions {
    #[serde(rename = "type")]
    pub kind: TransportKind,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub host: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_early_data: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_data_header_name: Option<String>,
}

impl TransportOptions {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            host: Listable::new(),
            path: None,
            headers: BTreeMap::new(),
            service_name: None,
            max_early_data: None,
            early_data_header_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObfsOptions {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A single outbound. Fields that do not apply to `kind` stay unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Outbound {
    #[serde(rename = "type")]
    pub kind: OutboundKind,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    // dialing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_strategy: Option<String>,

    // credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_opts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_encoding: Option<String>,

    // hysteria2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_mbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_mbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfs: Option<ObfsOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportOptions>,

    // selector / urltest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_exist_connections: Option<bool>,
}

impl Outbound {
    /// Bare outbound of `kind` with only a tag.
    pub fn new(kind: OutboundKind, tag: impl Into<String>) -> Self {
        Self {
            kind,
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn direct(tag: impl Into<String>) -> Self {
        Self::new(OutboundKind::Direct, tag)
    }

    pub fn block(tag: impl Into<String>) -> Self {
        Self::new(OutboundKind::Block, tag)
    }

    pub fn dns(tag: impl Into<String>) -> Self {
        Self::new(OutboundKind::Dns, tag)
    }

    /// Proxy outbound dialing `server:port`.
    pub fn proxy(
        kind: OutboundKind,
        tag: impl Into<String>,
        server: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            server: Some(server.into()),
            server_port: Some(port),
            ..Self::new(kind, tag)
        }
    }

    /// Manual selector over `members`, defaulting to the first one.
    pub fn selector(tag: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            default: members.first().cloned(),
            outbounds: members,
            ..Self::new(OutboundKind::Selector, tag)
        }
    }

    /// Latency-tested group over `members`.
    pub fn urltest(tag: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            outbounds: members,
            ..Self::new(OutboundKind::Urltest, tag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vmess_outbound_decodes() {
        let outbound: Outbound = serde_json::from_str(
            r#"{
                "type": "vmess",
                "tag": "hk-1",
                "server": "hk.example.com",
                "server_port": 443,
                "uuid": "b831381d-6324-4d53-ad4f-8cda48b30811",
                "security": "auto",
                "tls": {"enabled": true, "server_name": "hk.example.com"},
                "transport": {"type": "ws", "path": "/ray"}
            }"#,
        )
        .unwrap();
        assert_eq!(outbound.kind, OutboundKind::Vmess);
        assert!(outbound.kind.is_proxy());
        assert_eq!(outbound.transport.unwrap().kind, TransportKind::Ws);
    }

    #[test]
    fn test_unknown_outbound_field_rejected() {
        let result: Result<Outbound, _> =
            serde_json::from_str(r#"{"type": "direct", "tag": "direct", "cipher": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_selector_defaults_to_first_member() {
        let selector = Outbound::selector("select", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(selector.default.as_deref(), Some("a"));
        assert!(selector.kind.is_group());
    }

    #[test]
    fn test_direct_serializes_minimal() {
        let json = serde_json::to_string(&Outbound::direct("direct")).unwrap();
        assert_eq!(json, r#"{"type":"direct","tag":"direct"}"#);
    }
}
