//! Canonical configuration model for the downstream proxy engine.
//!
//! This crate owns two things:
//! - A strict serde model of the engine's native configuration (`Options`).
//!   Deserialization rejects unknown fields, so a successful decode means the
//!   document is structurally canonical.
//! - `check_config`, the engine's semantic checker: reference integrity,
//!   required fields and value ranges. Structural success does not imply the
//!   document passes this check.

mod check;
mod error;
mod inbound;
mod listable;
mod options;
mod outbound;

pub use check::{check_config, check_options, CheckError, Issue};
pub use error::SchemaError;
pub use inbound::{Inbound, InboundKind, InboundUser};
pub use listable::Listable;
pub use options::{
    CacheFileOptions, ClashApiOptions, DnsOptions, DnsRule, DnsServer, ExperimentalOptions,
    GeoResource, LogOptions, NtpOptions, Options, RouteOptions, RouteRule,
};
pub use outbound::{
    ObfsOptions, Outbound, OutboundKind, RealityOptions, TlsOptions, TransportKind,
    TransportOptions, UtlsOptions,
};

/// Log levels accepted by the engine.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "fatal", "panic"];

/// Shadowsocks ciphers accepted by the engine.
pub const SHADOWSOCKS_METHODS: &[&str] = &[
    "none",
    "2022-blake3-aes-128-gcm",
    "2022-blake3-aes-256-gcm",
    "2022-blake3-chacha20-poly1305",
    "aes-128-gcm",
    "aes-192-gcm",
    "aes-256-gcm",
    "chacha20-ietf-poly1305",
    "xchacha20-ietf-poly1305",
    "aes-128-ctr",
    "aes-192-ctr",
    "aes-256-ctr",
    "aes-128-cfb",
    "aes-192-cfb",
    "aes-256-cfb",
    "rc4-md5",
    "chacha20-ietf",
    "xchacha20",
];
