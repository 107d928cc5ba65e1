//! Per-scheme share link parsing.

use std::collections::HashMap;

use ingest_schema::{
    ObfsOptions, Outbound, OutboundKind, RealityOptions, TlsOptions, TransportKind,
    TransportOptions, UtlsOptions,
};
use url::Url;

use super::encoding::{decode_base64_text, percent_decode};
use super::vmess;
use super::{ShareEntry, ShareLinkError};

/// Parse one `scheme://...` share link.
pub fn parse_link(line: &str) -> Result<ShareEntry, ShareLinkError> {
    let (scheme, rest) = line
        .split_once("://")
        .ok_or_else(|| ShareLinkError::NotALink(preview(line)))?;

    match scheme.to_ascii_lowercase().as_str() {
        "vmess" => vmess::parse_vmess_link(rest.split('#').next().unwrap_or(rest)),
        "vless" => parse_vless(&parse_url(line)?),
        "trojan" => parse_trojan(&parse_url(line)?),
        "ss" => parse_shadowsocks(rest),
        "socks" | "socks5" => parse_socks(&parse_url(line)?),
        "hysteria2" | "hy2" => parse_hysteria2(&parse_url(line)?),
        other => Err(ShareLinkError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_url(line: &str) -> Result<Url, ShareLinkError> {
    Url::parse(line).map_err(|e| ShareLinkError::InvalidUrl(format!("{}: {}", preview(line), e)))
}

/// First few characters of a link, for error messages.
fn preview(line: &str) -> String {
    let head: String = line.chars().take(32).collect();
    if head.len() < line.len() {
        format!("{}...", head)
    } else {
        head
    }
}

fn endpoint(url: &Url, scheme: &'static str) -> Result<(String, u16), ShareLinkError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(ShareLinkError::MissingField { scheme, field: "host" })?;
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    let port = url
        .port()
        .filter(|p| *p != 0)
        .ok_or(ShareLinkError::MissingField { scheme, field: "port" })?;
    Ok((host, port))
}

fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

fn link_name(url: &Url) -> Option<String> {
    url.fragment()
        .map(percent_decode)
        .filter(|n| !n.trim().is_empty())
}

fn flag(params: &HashMap<String, String>, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .find_map(|k| params.get(*k))
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn non_empty(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

fn tls_from_params(params: &HashMap<String, String>, host: &str) -> TlsOptions {
    TlsOptions {
        enabled: true,
        server_name: non_empty(params, "sni")
            .or_else(|| non_empty(params, "peer"))
            .or_else(|| Some(host.to_string())),
        insecure: flag(params, &["allowInsecure", "insecure"]),
        alpn: params
            .get("alpn")
            .map(|a| a.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default(),
        utls: non_empty(params, "fp").map(|fingerprint| UtlsOptions {
            enabled: true,
            fingerprint: Some(fingerprint),
        }),
        reality: None,
    }
}

fn transport_from_params(params: &HashMap<String, String>) -> Option<TransportOptions> {
    let host = non_empty(params, "host");
    let path = non_empty(params, "path");

    let kind = match params.get("type").map(String::as_str).unwrap_or("tcp") {
        "ws" => TransportKind::Ws,
        "grpc" => TransportKind::Grpc,
        "http" | "h2" => TransportKind::Http,
        "httpupgrade" => TransportKind::Httpupgrade,
        "quic" => TransportKind::Quic,
        "tcp" if params.get("headerType").map(String::as_str) == Some("http") => {
            TransportKind::Http
        }
        _ => return None,
    };

    let mut transport = TransportOptions::new(kind);
    match kind {
        TransportKind::Ws => {
            transport.path = path;
            if let Some(host) = host {
                transport.headers.insert("Host".to_string(), host);
            }
        }
        TransportKind::Grpc => {
            transport.service_name = non_empty(params, "serviceName");
        }
        TransportKind::Http | TransportKind::Httpupgrade => {
            transport.path = path;
            transport.host = host
                .map(|h| h.split(',').map(str::to_string).collect())
                .unwrap_or_default();
        }
        TransportKind::Quic => {}
    }
    Some(transport)
}

fn parse_vless(url: &Url) -> Result<ShareEntry, ShareLinkError> {
    let (host, port) = endpoint(url, "vless")?;
    let uuid = percent_decode(url.username());
    if uuid.is_empty() {
        return Err(ShareLinkError::MissingField { scheme: "vless", field: "uuid" });
    }
    let params = query(url);

    let mut outbound = Outbound::proxy(OutboundKind::Vless, "", host.clone(), port);
    outbound.uuid = Some(uuid);
    outbound.flow = non_empty(&params, "flow");
    outbound.transport = transport_from_params(&params);

    match params.get("security").map(String::as_str) {
        Some("tls") | Some("xtls") => outbound.tls = Some(tls_from_params(&params, &host)),
        Some("reality") => {
            let mut tls = tls_from_params(&params, &host);
            tls.reality = Some(RealityOptions {
                enabled: true,
                public_key: non_empty(&params, "pbk"),
                short_id: params.get("sid").cloned(),
            });
            // reality requires a uTLS fingerprint
            if tls.utls.is_none() {
                tls.utls = Some(UtlsOptions {
                    enabled: true,
                    fingerprint: Some("chrome".to_string()),
                });
            }
            outbound.tls = Some(tls);
        }
        _ => {}
    }

    Ok(ShareEntry {
        scheme: "vless",
        name: link_name(url),
        outbound,
    })
}

fn parse_trojan(url: &Url) -> Result<ShareEntry, ShareLinkError> {
    let (host, port) = endpoint(url, "trojan")?;
    let password = percent_decode(url.username());
    if password.is_empty() {
        return Err(ShareLinkError::MissingField { scheme: "trojan", field: "password" });
    }
    let params = query(url);

    let mut outbound = Outbound::proxy(OutboundKind::Trojan, "", host.clone(), port);
    outbound.password = Some(password);
    outbound.transport = transport_from_params(&params);
    if params.get("security").map(String::as_str) != Some("none") {
        outbound.tls = Some(tls_from_params(&params, &host));
    }

    Ok(ShareEntry {
        scheme: "trojan",
        name: link_name(url),
        outbound,
    })
}

fn parse_hysteria2(url: &Url) -> Result<ShareEntry, ShareLinkError> {
    let (host, port) = endpoint(url, "hysteria2")?;
    let user = percent_decode(url.username());
    let password = match url.password() {
        Some(pass) => format!("{}:{}", user, percent_decode(pass)),
        None => user,
    };
    if password.is_empty() {
        return Err(ShareLinkError::MissingField { scheme: "hysteria2", field: "password" });
    }
    let params = query(url);

    let mut outbound = Outbound::proxy(OutboundKind::Hysteria2, "", host.clone(), port);
    outbound.password = Some(password);
    outbound.tls = Some(tls_from_params(&params, &host));
    outbound.up_mbps = params.get("upmbps").and_then(|v| v.parse().ok());
    outbound.down_mbps = params.get("downmbps").and_then(|v| v.parse().ok());
    if let Some(kind) = non_empty(&params, "obfs") {
        outbound.obfs = Some(ObfsOptions {
            kind,
            password: non_empty(&params, "obfs-password"),
        });
    }

    Ok(ShareEntry {
        scheme: "hysteria2",
        name: link_name(url),
        outbound,
    })
}

fn parse_socks(url: &Url) -> Result<ShareEntry, ShareLinkError> {
    let (host, port) = endpoint(url, "socks")?;
    let user = percent_decode(url.username());

    let (username, password) = match url.password() {
        Some(pass) => (Some(user), Some(percent_decode(pass))),
        None if user.is_empty() => (None, None),
        // v2rayN encodes "user:pass" as base64 in the userinfo
        None => match decode_base64_text(&user).as_deref().and_then(|s| s.split_once(':')) {
            Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
            None => (Some(user), None),
        },
    };

    let mut outbound = Outbound::proxy(OutboundKind::Socks, "", host, port);
    outbound.version = Some("5".to_string());
    outbound.username = username;
    outbound.password = password;

    Ok(ShareEntry {
        scheme: "socks",
        name: link_name(url),
        outbound,
    })
}

/// Shadowsocks, both SIP002 (`ss://userinfo@host:port`) and the legacy form
/// where everything before the name is one base64 blob.
fn parse_shadowsocks(rest: &str) -> Result<ShareEntry, ShareLinkError> {
    let (body, fragment) = match rest.split_once('#') {
        Some((body, fragment)) => (body, Some(fragment)),
        None => (rest, None),
    };
    let name = fragment.map(percent_decode).filter(|n| !n.trim().is_empty());

    let (method, password, host, port, params) = if body.contains('@') {
        let url = parse_url(&format!("ss://{}", body))?;
        let (host, port) = endpoint(&url, "ss")?;
        let user = percent_decode(url.username());
        let (method, password) = match url.password() {
            Some(pass) => (user, percent_decode(pass)),
            None => split_credentials(&user)?,
        };
        (method, password, host, port, query(&url))
    } else {
        let blob = body.split(['/', '?']).next().unwrap_or(body);
        let decoded = decode_base64_text(blob)
            .ok_or_else(|| ShareLinkError::InvalidUrl("ss payload is not base64".to_string()))?;
        let (credentials, address) = decoded
            .rsplit_once('@')
            .ok_or(ShareLinkError::MissingField { scheme: "ss", field: "host" })?;
        let (method, password) = credentials
            .split_once(':')
            .ok_or(ShareLinkError::MissingField { scheme: "ss", field: "password" })?;
        let (host, port) = split_host_port(address)?;
        (method.to_string(), password.to_string(), host, port, HashMap::new())
    };

    let mut outbound = Outbound::proxy(OutboundKind::Shadowsocks, "", host, port);
    outbound.method = Some(method);
    outbound.password = Some(password);
    if let Some(plugin) = non_empty(&params, "plugin") {
        match plugin.split_once(';') {
            Some((name, opts)) => {
                outbound.plugin = Some(name.to_string());
                outbound.plugin_opts = Some(opts.to_string());
            }
            None => outbound.plugin = Some(plugin),
        }
    }

    Ok(ShareEntry {
        scheme: "ss",
        name,
        outbound,
    })
}

/// `method:password`, either base64-encoded or plain.
fn split_credentials(userinfo: &str) -> Result<(String, String), ShareLinkError> {
    let decoded = decode_base64_text(userinfo).unwrap_or_else(|| userinfo.to_string());
    decoded
        .split_once(':')
        .map(|(m, p)| (m.to_string(), p.to_string()))
        .ok_or(ShareLinkError::MissingField { scheme: "ss", field: "password" })
}

fn split_host_port(address: &str) -> Result<(String, u16), ShareLinkError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or(ShareLinkError::MissingField { scheme: "ss", field: "port" })?;
    let port: u16 = port
        .trim_end_matches('/')
        .parse()
        .map_err(|_| ShareLinkError::InvalidPort(port.to_string()))?;
    if port == 0 {
        return Err(ShareLinkError::InvalidPort("0".to_string()));
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port))
}
