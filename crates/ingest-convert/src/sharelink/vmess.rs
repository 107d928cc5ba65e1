//! v2rayN vmess share payloads.
//!
//! `vmess://` links carry a base64 JSON object; the same object is also what
//! clients export when asked for a JSON share.

use ingest_schema::{Outbound, OutboundKind, TlsOptions, TransportKind, TransportOptions, UtlsOptions};
use serde::Deserialize;
use serde_json::Value;

use super::encoding::decode_base64_text;
use super::{ShareEntry, ShareLinkError};

/// Number fields arrive as either JSON numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) if s.trim().is_empty() => None,
            Self::String(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct VmessShare {
    #[serde(default)]
    ps: Option<String>,
    add: String,
    port: NumberOrString,
    id: String,
    #[serde(default)]
    aid: Option<NumberOrString>,
    #[serde(default)]
    scy: Option<String>,
    #[serde(default)]
    net: Option<String>,
    #[serde(default, rename = "type")]
    header_type: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    tls: Option<String>,
    #[serde(default)]
    sni: Option<String>,
    #[serde(default)]
    alpn: Option<String>,
    #[serde(default)]
    fp: Option<String>,
}

/// Decode the payload after `vmess://`.
pub fn parse_vmess_link(payload: &str) -> Result<ShareEntry, ShareLinkError> {
    let text = decode_base64_text(payload)
        .ok_or_else(|| ShareLinkError::VmessPayload("payload is not base64".to_string()))?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| ShareLinkError::VmessPayload(e.to_string()))?;
    parse_vmess_value(value)
}

/// Convert one exported vmess JSON object.
pub fn parse_vmess_value(value: Value) -> Result<ShareEntry, ShareLinkError> {
    let share: VmessShare =
        serde_json::from_value(value).map_err(|e| ShareLinkError::VmessPayload(e.to_string()))?;

    let port = share
        .port
        .as_u64()
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| ShareLinkError::InvalidPort(format!("{:?}", share.port)))?;

    let mut outbound = Outbound::proxy(OutboundKind::Vmess, "", share.add.clone(), port);
    outbound.uuid = Some(share.id.clone());
    outbound.alter_id = share
        .aid
        .as_ref()
        .and_then(NumberOrString::as_u64)
        .and_then(|a| u32::try_from(a).ok());
    outbound.security = Some(
        share
            .scy
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "auto".to_string()),
    );
    outbound.transport = transport(&share);

    if share.tls.as_deref() == Some("tls") {
        let server_name = share
            .sni
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| share.host.clone().filter(|h| !h.is_empty()));
        outbound.tls = Some(TlsOptions {
            enabled: true,
            server_name,
            alpn: share
                .alpn
                .as_deref()
                .map(|a| a.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            utls: share.fp.clone().filter(|f| !f.is_empty()).map(|fingerprint| UtlsOptions {
                enabled: true,
                fingerprint: Some(fingerprint),
            }),
            ..TlsOptions::default()
        });
    }

    Ok(ShareEntry {
        scheme: "vmess",
        name: share.ps.filter(|n| !n.trim().is_empty()),
        outbound,
    })
}

fn transport(share: &VmessShare) -> Option<TransportOptions> {
    let host = share.host.clone().filter(|h| !h.is_empty());
    let path = share.path.clone().filter(|p| !p.is_empty());

    match share.net.as_deref().unwrap_or("tcp") {
        "ws" => {
            let mut transport = TransportOptions::new(TransportKind::Ws);
            transport.path = path;
            if let Some(host) = host {
                transport.headers.insert("Host".to_string(), host);
            }
            Some(transport)
        }
        "grpc" => {
            let mut transport = TransportOptions::new(TransportKind::Grpc);
            transport.service_name = path;
            Some(transport)
        }
        "h2" | "http" => {
            let mut transport = TransportOptions::new(TransportKind::Http);
            transport.host = host.into_iter().collect();
            transport.path = path;
            Some(transport)
        }
        "tcp" if share.header_type.as_deref() == Some("http") => {
            let mut transport = TransportOptions::new(TransportKind::Http);
            transport.host = host.into_iter().collect();
            transport.path = path;
            Some(transport)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;

    #[test]
    fn test_ws_tls_share() {
        let payload = STANDARD.encode(
            json!({
                "v": "2", "ps": "HK 01", "add": "hk.example.com", "port": "443",
                "id": "b831381d-6324-4d53-ad4f-8cda48b30811", "aid": "0", "scy": "auto",
                "net": "ws", "type": "none", "host": "cdn.example.com", "path": "/ray",
                "tls": "tls", "sni": "", "fp": "chrome"
            })
            .to_string(),
        );
        let entry = parse_vmess_link(&payload).unwrap();
        assert_eq!(entry.name.as_deref(), Some("HK 01"));

        let outbound = entry.outbound;
        assert_eq!(outbound.server_port, Some(443));
        assert_eq!(outbound.alter_id, Some(0));
        let transport = outbound.transport.unwrap();
        assert_eq!(transport.kind, TransportKind::Ws);
        assert_eq!(transport.headers.get("Host").map(String::as_str), Some("cdn.example.com"));
        let tls = outbound.tls.unwrap();
        assert_eq!(tls.server_name.as_deref(), Some("cdn.example.com"));
        assert_eq!(tls.utls.unwrap().fingerprint.as_deref(), Some("chrome"));
    }

    #[test]
    fn test_numeric_port_plain_tcp() {
        let entry = parse_vmess_value(json!({
            "add": "1.2.3.4", "port": 10086, "id": "b831381d-6324-4d53-ad4f-8cda48b30811"
        }))
        .unwrap();
        assert_eq!(entry.outbound.server_port, Some(10086));
        assert!(entry.outbound.transport.is_none());
        assert!(entry.outbound.tls.is_none());
        assert_eq!(entry.outbound.security.as_deref(), Some("auto"));
        assert!(entry.name.is_none());
    }

    #[test]
    fn test_bad_port() {
        let result = parse_vmess_value(json!({"add": "h", "port": "http", "id": "x"}));
        assert!(matches!(result, Err(ShareLinkError::InvalidPort(_))));
    }

    #[test]
    fn test_payload_not_base64() {
        assert!(matches!(
            parse_vmess_link("@@@"),
            Err(ShareLinkError::VmessPayload(_))
        ));
    }
}
