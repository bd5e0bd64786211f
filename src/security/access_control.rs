//! Origin and target allowlist enforcement.
//!
//! Checks run in a fixed order and each one short-circuits:
//! missing target (400), origin (403), target host (403).

use std::collections::HashSet;

use url::Url;

use crate::config::PolicyConfig;
use crate::error::{GatewayError, Result};

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTarget {
    /// The origin, now known to be allowlisted and safe to echo.
    pub origin: String,
    /// The raw `url` parameter, as the client sent it.
    pub raw: String,
    /// Parsed target URL.
    pub url: Url,
}

impl ValidatedTarget {
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

/// Static allowlists, built once at startup.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    origins: HashSet<String>,
    targets: HashSet<String>,
}

impl AccessPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            origins: config.allowed_origins.iter().cloned().collect(),
            targets: config.allowed_targets.iter().cloned().collect(),
        }
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    pub fn is_target_allowed(&self, host: &str) -> bool {
        self.targets.contains(host)
    }

    /// Validate the forwarding target and origin of a request.
    ///
    /// `target` is the `url` query parameter, `origin` the `Origin` header
    /// (empty when absent).
    pub fn validate(&self, target: Option<&str>, origin: &str) -> Result<ValidatedTarget> {
        let raw = match target {
            Some(t) if !t.is_empty() => t,
            _ => return Err(GatewayError::MissingTarget),
        };

        if !self.is_origin_allowed(origin) {
            return Err(GatewayError::OriginNotAllowed(origin.to_string()));
        }

        // An unparseable target resolves to the empty host, which never matches.
        let parsed = Url::parse(raw).ok();
        let host = parsed
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or_default()
            .to_string();

        match parsed {
            Some(url) if self.is_target_allowed(&host) => Ok(ValidatedTarget {
                origin: origin.to_string(),
                raw: raw.to_string(),
                url,
            }),
            _ => Err(GatewayError::TargetNotAllowed(host)),
        }
    }
}
