//! Partial canonical document produced by format converters.

use ingest_schema::{Outbound, RouteRule};
use serde::{Deserialize, Serialize};

/// Proxy and rule definitions only. Has no log, dns, inbound or
/// experimental sections and may reference built-in outbounds (`direct`,
/// `block`) it does not define itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub outbounds: Vec<Outbound>,
    pub rules: Vec<RouteRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_outbound: Option<String>,
}

impl Fragment {
    /// Tags of every outbound defined by the fragment.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.outbounds.iter().map(|o| o.tag.as_str())
    }
}
