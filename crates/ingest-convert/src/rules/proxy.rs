//! `proxies` entries into canonical outbounds.

use ingest_schema::{
    ObfsOptions, Outbound, OutboundKind, RealityOptions, TlsOptions, TransportKind,
    TransportOptions, UtlsOptions,
};

use super::doc::ClashProxy;
use super::RulesError;

/// Convert one proxy entry.
///
/// Returns `Ok(None)` for proxy types the engine has no outbound for; the
/// caller skips those.
pub fn convert_proxy(proxy: &ClashProxy) -> Result<Option<Outbound>, RulesError> {
    let kind = match proxy.kind.as_str() {
        "ss" => OutboundKind::Shadowsocks,
        "vmess" => OutboundKind::Vmess,
        "vless" => OutboundKind::Vless,
        "trojan" => OutboundKind::Trojan,
        "socks5" => OutboundKind::Socks,
        "http" => OutboundKind::Http,
        "hysteria2" | "hy2" => OutboundKind::Hysteria2,
        _ => return Ok(None),
    };

    let server = proxy
        .server
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(proxy, "missing server"))?;
    let port = proxy
        .port
        .as_ref()
        .and_then(|p| p.as_port())
        .ok_or_else(|| invalid(proxy, "missing or invalid port"))?;

    let mut outbound = Outbound::proxy(kind, proxy.name.clone(), server, port);
    if proxy.udp == Some(false) && kind != OutboundKind::Hysteria2 {
        outbound.network = Some("tcp".to_string());
    }

    match kind {
        OutboundKind::Shadowsocks => {
            outbound.method = Some(require(proxy, &proxy.cipher, "cipher")?);
            outbound.password = Some(require(proxy, &proxy.password, "password")?);
            apply_plugin(proxy, &mut outbound);
        }
        OutboundKind::Vmess => {
            outbound.uuid = Some(require(proxy, &proxy.uuid, "uuid")?);
            outbound.alter_id = proxy.alter_id;
            outbound.security = Some(proxy.cipher.clone().unwrap_or_else(|| "auto".to_string()));
            outbound.transport = transport(proxy);
            if proxy.tls == Some(true) {
                outbound.tls = Some(tls(proxy));
            }
        }
        OutboundKind::Vless => {
            outbound.uuid = Some(require(proxy, &proxy.uuid, "uuid")?);
            outbound.flow = proxy.flow.clone().filter(|f| !f.is_empty());
            outbound.transport = transport(proxy);
            if proxy.tls == Some(true) || proxy.reality_opts.is_some() {
                outbound.tls = Some(tls(proxy));
            }
        }
        OutboundKind::Trojan => {
            outbound.password = Some(require(proxy, &proxy.password, "password")?);
            outbound.transport = transport(proxy);
            outbound.tls = Some(tls(proxy));
        }
        OutboundKind::Socks | OutboundKind::Http => {
            if kind == OutboundKind::Socks {
                outbound.version = Some("5".to_string());
            }
            outbound.username = proxy.username.clone();
            outbound.password = proxy.password.clone();
            if proxy.tls == Some(true) {
                outbound.tls = Some(tls(proxy));
            }
        }
        OutboundKind::Hysteria2 => {
            let password = proxy.password.clone().or_else(|| proxy.auth.clone());
            outbound.password = Some(require(proxy, &password, "password")?);
            outbound.up_mbps = proxy.up.as_ref().and_then(|v| v.as_mbps());
            outbound.down_mbps = proxy.down.as_ref().and_then(|v| v.as_mbps());
            if let Some(kind) = proxy.obfs.clone().filter(|o| !o.is_empty()) {
                outbound.obfs = Some(ObfsOptions {
                    kind,
                    password: proxy.obfs_password.clone(),
                });
            }
            outbound.tls = Some(tls(proxy));
        }
        _ => {}
    }

    Ok(Some(outbound))
}

fn invalid(proxy: &ClashProxy, reason: &str) -> RulesError {
    RulesError::Proxy {
        name: proxy.name.clone(),
        reason: reason.to_string(),
    }
}

fn require(
    proxy: &ClashProxy,
    value: &Option<String>,
    field: &str,
) -> Result<String, RulesError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(proxy, &format!("missing {}", field)))
}

fn tls(proxy: &ClashProxy) -> TlsOptions {
    let server_name = proxy
        .sni
        .clone()
        .or_else(|| proxy.servername.clone())
        .filter(|s| !s.is_empty())
        .or_else(|| proxy.server.clone());

    let reality = proxy.reality_opts.as_ref().map(|r| RealityOptions {
        enabled: true,
        public_key: r.public_key.clone(),
        short_id: r.short_id.clone(),
    });
    let fingerprint = proxy
        .client_fingerprint
        .clone()
        .or_else(|| reality.as_ref().map(|_| "chrome".to_string()));

    TlsOptions {
        enabled: true,
        server_name,
        insecure: proxy.skip_cert_verify.filter(|v| *v),
        alpn: proxy.alpn.iter().cloned().collect(),
        utls: fingerprint.map(|fingerprint| UtlsOptions {
            enabled: true,
            fingerprint: Some(fingerprint),
        }),
        reality,
    }
}

fn transport(proxy: &ClashProxy) -> Option<TransportOptions> {
    match proxy.network.as_deref()? {
        "ws" => {
            let opts = proxy.ws_opts.clone().unwrap_or_default();
            let mut transport = TransportOptions::new(TransportKind::Ws);
            transport.path = opts.path;
            transport.headers = opts.headers;
            transport.max_early_data = opts.max_early_data;
            transport.early_data_header_name = opts.early_data_header_name;
            Some(transport)
        }
        "grpc" => {
            let mut transport = TransportOptions::new(TransportKind::Grpc);
            transport.service_name = proxy
                .grpc_opts
                .as_ref()
                .and_then(|g| g.grpc_service_name.clone());
            Some(transport)
        }
        "h2" | "http" => {
            let opts = proxy.h2_opts.clone().unwrap_or_default();
            let mut transport = TransportOptions::new(TransportKind::Http);
            transport.host = opts.host.into_iter().collect();
            transport.path = opts.path;
            Some(transport)
        }
        _ => None,
    }
}

/// Map `plugin`/`plugin-opts` onto the engine's SIP003 plugin string.
fn apply_plugin(proxy: &ClashProxy, outbound: &mut Outbound) {
    let Some(plugin) = proxy.plugin.as_deref() else {
        return;
    };
    let opt = |key: &str| proxy.plugin_opts.get(key).and_then(yaml_scalar);

    match plugin {
        "obfs" => {
            let mut parts = Vec::new();
            if let Some(mode) = opt("mode") {
                parts.push(format!("obfs={}", mode));
            }
            if let Some(host) = opt("host") {
                parts.push(format!("obfs-host={}", host));
            }
            outbound.plugin = Some("obfs-local".to_string());
            outbound.plugin_opts = Some(parts.join(";"));
        }
        "v2ray-plugin" => {
            let mut parts = Vec::new();
            for key in ["mode", "host", "path"] {
                if let Some(value) = opt(key) {
                    parts.push(format!("{}={}", key, value));
                }
            }
            if opt("tls").as_deref() == Some("true") {
                parts.push("tls".to_string());
            }
            outbound.plugin = Some("v2ray-plugin".to_string());
            outbound.plugin_opts = Some(parts.join(";"));
        }
        other => {
            tracing::warn!(proxy = %proxy.name, plugin = other, "unsupported shadowsocks plugin dropped");
        }
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(yaml: &str) -> ClashProxy {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_shadowsocks_with_obfs() {
        let p = proxy(
            "{name: ss1, type: ss, server: 1.2.3.4, port: 8388, cipher: aes-256-gcm, password: pw, \
             plugin: obfs, plugin-opts: {mode: http, host: bing.com}}",
        );
        let outbound = convert_proxy(&p).unwrap().unwrap();
        assert_eq!(outbound.kind, OutboundKind::Shadowsocks);
        assert_eq!(outbound.tag, "ss1");
        assert_eq!(outbound.plugin.as_deref(), Some("obfs-local"));
        assert_eq!(outbound.plugin_opts.as_deref(), Some("obfs=http;obfs-host=bing.com"));
    }

    #[test]
    fn test_vmess_ws_tls() {
        let p = proxy(
            "{name: v1, type: vmess, server: v.example.com, port: '443', \
             uuid: b831381d-6324-4d53-ad4f-8cda48b30811, alterId: 0, cipher: auto, tls: true, \
             servername: cdn.example.com, network: ws, \
             ws-opts: {path: /ray, headers: {Host: cdn.example.com}}}",
        );
        let outbound = convert_proxy(&p).unwrap().unwrap();
        assert_eq!(outbound.server_port, Some(443));
        assert_eq!(outbound.tls.unwrap().server_name.as_deref(), Some("cdn.example.com"));
        let transport = outbound.transport.unwrap();
        assert_eq!(transport.path.as_deref(), Some("/ray"));
        assert_eq!(transport.headers["Host"], "cdn.example.com");
    }

    #[test]
    fn test_vless_reality() {
        let p = proxy(
            "{name: r1, type: vless, server: 1.2.3.4, port: 443, \
             uuid: b831381d-6324-4d53-ad4f-8cda48b30811, flow: xtls-rprx-vision, \
             servername: www.apple.com, reality-opts: {public-key: KEY, short-id: ab}}",
        );
        let tls = convert_proxy(&p).unwrap().unwrap().tls.unwrap();
        assert_eq!(tls.reality.unwrap().public_key.as_deref(), Some("KEY"));
        assert_eq!(tls.utls.unwrap().fingerprint.as_deref(), Some("chrome"));
    }

    #[test]
    fn test_hysteria2_bandwidth_and_udp() {
        let p = proxy(
            "{name: h1, type: hysteria2, server: h.example.com, port: 8443, password: pw, \
             up: '30 Mbps', down: 100, udp: false}",
        );
        let outbound = convert_proxy(&p).unwrap().unwrap();
        assert_eq!(outbound.up_mbps, Some(30));
        assert_eq!(outbound.down_mbps, Some(100));
        assert!(outbound.network.is_none());
    }

    #[test]
    fn test_socks_tcp_only() {
        let p = proxy("{name: s1, type: socks5, server: 127.0.0.1, port: 1080, udp: false}");
        let outbound = convert_proxy(&p).unwrap().unwrap();
        assert_eq!(outbound.version.as_deref(), Some("5"));
        assert_eq!(outbound.network.as_deref(), Some("tcp"));
    }

    #[test]
    fn test_unsupported_type_is_none() {
        let p = proxy("{name: w1, type: wireguard, server: 1.2.3.4, port: 51820}");
        assert!(convert_proxy(&p).unwrap().is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let p = proxy("{name: t1, type: trojan, server: t.example.com, port: 443}");
        let err = convert_proxy(&p).unwrap_err();
        assert!(matches!(err, RulesError::Proxy { ref name, .. } if name == "t1"));
        assert!(err.to_string().contains("missing password"));
    }

    #[test]
    fn test_port_out_of_range() {
        let p = proxy("{name: t1, type: trojan, server: t.example.com, port: 70000, password: x}");
        assert!(convert_proxy(&p).is_err());
    }
}
