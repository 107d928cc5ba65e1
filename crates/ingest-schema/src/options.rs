//! Top-level canonical options and the log/dns/route/experimental sections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::inbound::Inbound;
use crate::listable::Listable;
use crate::outbound::Outbound;

/// Root of a canonical configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntp: Option<NtpOptions>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbounds: Vec<Inbound>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<Outbound>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<ExperimentalOptions>,
}

impl Options {
    /// Strict structural decode from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        let text = std::str::from_utf8(bytes)?;
        Self::from_text(text)
    }

    /// Strict structural decode from text.
    ///
    /// Derived struct visitors also accept a JSON array laid out in field
    /// order, so the decoded model is re-encoded and every position that
    /// holds an object there must hold an object in the input too.
    pub fn from_text(text: &str) -> Result<Self, SchemaError> {
        let options: Options = serde_json::from_str(text)?;
        let input: Value = serde_json::from_str(text)?;
        let decoded = serde_json::to_value(&options)?;
        require_objects(&input, &decoded, "")?;
        Ok(options)
    }

    /// Serialize as pretty-printed JSON bytes.
    pub fn to_vec_pretty(&self) -> Result<Vec<u8>, SchemaError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Find an outbound by tag.
    pub fn outbound(&self, tag: &str) -> Option<&Outbound> {
        self.outbounds.iter().find(|o| o.tag == tag)
    }
}

fn require_objects(input: &Value, decoded: &Value, path: &str) -> Result<(), SchemaError> {
    match (input, decoded) {
        (Value::Object(input), Value::Object(decoded)) => {
            for (key, decoded_value) in decoded {
                if let Some(input_value) = input.get(key) {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    require_objects(input_value, decoded_value, &child)?;
                }
            }
            Ok(())
        }
        (Value::Array(input), Value::Array(decoded)) if input.len() == decoded.len() => input
            .iter()
            .zip(decoded)
            .enumerate()
            .try_for_each(|(i, (a, b))| require_objects(a, b, &format!("{}[{}]", path, i))),
        (_, Value::Object(_)) => Err(SchemaError::NotAnObject(if path.is_empty() {
            "document root".to_string()
        } else {
            path.to_string()
        })),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NtpOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detour: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<DnsServer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<DnsRule>,

    /// Default server tag.
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_expire: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub independent_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_mapping: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_resolver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detour: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsRule {
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub inbound: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub query_type: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain_suffix: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain_keyword: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain_regex: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub geosite: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub outbound: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clash_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_cache: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoip: Option<GeoResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geosite: Option<GeoResource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RouteRule>,

    /// Default outbound tag.
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_outbound: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_detect_interface: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_android_vpn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mark: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_detour: Option<String>,
}

/// A single routing rule. All populated match fields must hold; `outbound`
/// names the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub inbound: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<u8>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub network: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub protocol: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain_suffix: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain_keyword: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub domain_regex: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub geosite: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub source_geoip: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub geoip: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub source_ip_cidr: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub ip_cidr: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub source_port: Listable<u16>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub port: Listable<u16>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub port_range: Listable<String>,
    #[serde(default, skip_serializing_if = "Listable::is_empty")]
    pub process_name: Listable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clash_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    pub outbound: String,
}

impl RouteRule {
    /// Rule with no match conditions routing to `outbound`.
    pub fn to(outbound: impl Into<String>) -> Self {
        Self {
            outbound: outbound.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentalOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clash_api: Option<ClashApiOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<CacheFileOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClashApiOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ui: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheFileOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_canonical() {
        let options = Options::from_slice(b"{}").unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let result = Options::from_slice(br#"{"proxies": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_nested_field_rejected() {
        let result = Options::from_slice(br#"{"route": {"rules": [], "mode": "rule"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(Options::from_slice(b"[]").is_err());
        assert!(Options::from_slice(b"vmess://abc").is_err());
    }

    #[test]
    fn test_arrays_in_struct_positions_rejected() {
        for (text, path) in [
            ("[]", "document root"),
            ("[null]", "document root"),
            (r#"[{"level": "info"}]"#, "document root"),
            (r#"{"log": []}"#, "log"),
            (r#"{"route": [], "dns": [[]]}"#, "dns"),
            (r#"{"outbounds": [["direct", "direct"]]}"#, "outbounds[0]"),
            (r#"{"route": {"rules": [["dns-out"]]}}"#, "route.rules[0]"),
        ] {
            match Options::from_text(text) {
                Err(SchemaError::NotAnObject(at)) => assert_eq!(at, path, "{}", text),
                Err(SchemaError::Decode(_)) => {}
                other => panic!("{} decoded: {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_listable_arrays_still_accepted() {
        let text = r#"{"outbounds": [{"type": "direct", "tag": "direct"}],
            "route": {"rules": [{"domain": ["a.com", "b.com"], "outbound": "direct"}]}}"#;
        let options = Options::from_text(text).unwrap();
        assert_eq!(options.outbounds.len(), 1);
    }

    #[test]
    fn test_final_is_renamed() {
        let options =
            Options::from_slice(br#"{"route": {"final": "proxy", "rules": []}}"#).unwrap();
        let route = options.route.unwrap();
        assert_eq!(route.final_outbound.as_deref(), Some("proxy"));
    }

    #[test]
    fn test_route_rule_listable_fields() {
        let text = r#"{"route": {"rules": [
            {"domain_suffix": "example.com", "port": [80, 443], "outbound": "direct"}
        ]}}"#;
        let options = Options::from_text(text).unwrap();
        let rule = &options.route.unwrap().rules[0];
        assert_eq!(&*rule.domain_suffix, &["example.com".to_string()]);
        assert_eq!(&*rule.port, &[80, 443]);
    }

    #[test]
    fn test_rule_without_outbound_rejected() {
        let text = r#"{"route": {"rules": [{"domain": "example.com"}]}}"#;
        assert!(Options::from_text(text).is_err());
    }

    #[test]
    fn test_serialization_skips_empty_sections() {
        let options = Options {
            outbounds: vec![Outbound::direct("direct")],
            ..Options::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert!(json.get("route").is_none());
        assert!(json.get("inbounds").is_none());
        assert_eq!(json["outbounds"][0]["type"], "direct");
    }
}
