//! Serde model of a rule-routing YAML document.
//!
//! Only the keys the converter reads are modelled. Everything else a client
//! profile carries (`port`, `mode`, `dns`, ...) is ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleDoc {
    /// Required. A mapping without it is not a rule-routing document.
    pub proxies: Vec<ClashProxy>,
    #[serde(default)]
    pub proxy_groups: Vec<ProxyGroup>,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// Ports and bandwidths show up as numbers or quoted strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(u64),
    Text(String),
}

impl NumberOrText {
    pub fn as_port(&self) -> Option<u16> {
        let port = match self {
            Self::Number(n) => u16::try_from(*n).ok()?,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        (port != 0).then_some(port)
    }

    /// Bandwidth in Mbps; `"30 Mbps"` and `30` both read as 30.
    pub fn as_mbps(&self) -> Option<u32> {
        match self {
            Self::Number(n) => u32::try_from(*n).ok(),
            Self::Text(s) => {
                let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WsOpts {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub max_early_data: Option<u32>,
    #[serde(default)]
    pub early_data_header_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrpcOpts {
    #[serde(default)]
    pub grpc_service_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct H2Opts {
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RealityOpts {
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub short_id: Option<String>,
}

/// One entry of `proxies`. Fields are the union over every proxy type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClashProxy {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub port: Option<NumberOrText>,

    #[serde(default)]
    pub cipher: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, rename = "alterId")]
    pub alter_id: Option<u32>,
    #[serde(default)]
    pub flow: Option<String>,
    #[serde(default)]
    pub udp: Option<bool>,

    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub tls: Option<bool>,
    #[serde(default)]
    pub sni: Option<String>,
    #[serde(default)]
    pub servername: Option<String>,
    #[serde(default)]
    pub skip_cert_verify: Option<bool>,
    #[serde(default)]
    pub alpn: Vec<String>,
    #[serde(default)]
    pub client_fingerprint: Option<String>,
    #[serde(default)]
    pub reality_opts: Option<RealityOpts>,

    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub ws_opts: Option<WsOpts>,
    #[serde(default)]
    pub grpc_opts: Option<GrpcOpts>,
    #[serde(default)]
    pub h2_opts: Option<H2Opts>,

    #[serde(default)]
    pub obfs: Option<String>,
    #[serde(default)]
    pub obfs_password: Option<String>,
    #[serde(default)]
    pub up: Option<NumberOrText>,
    #[serde(default)]
    pub down: Option<NumberOrText>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub tolerance: Option<u16>,
}
