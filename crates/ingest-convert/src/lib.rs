//! Converters from non-canonical proxy formats into the canonical schema.
//!
//! - `sharelink`: proxy share links (`vmess://`, `vless://`, `trojan://`,
//!   `ss://`, `socks://`, `hysteria2://`), newline lists of them, base64
//!   subscriptions, and v2rayN vmess JSON exports. Produces a complete
//!   canonical document.
//! - `rules`: rule-routing YAML documents (`proxies`, `proxy-groups`,
//!   `rules`). Produces a [`Fragment`] that still has to be merged into a
//!   baseline template.

mod fragment;
pub mod rules;
pub mod sharelink;

pub use fragment::Fragment;
pub use rules::{RuleDoc, RulesError};
pub use sharelink::ShareLinkError;

/// Tag of the manual selector every converted document routes through.
pub const SELECT_TAG: &str = "select";

/// Tag of the latency-tested group emitted for share links.
pub const AUTO_TAG: &str = "auto";

/// Tag of the built-in direct outbound.
pub const DIRECT_TAG: &str = "direct";

/// Tag of the built-in block outbound.
pub const BLOCK_TAG: &str = "block";

/// Tag of the built-in DNS hijack outbound.
pub const DNS_TAG: &str = "dns-out";
