//! Exclusion rules: requests that must bypass the cache layer entirely.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. [`ExclusionRule::HostContains`] — the designated backend domains,
//!    which run their own offline queueing and must see every request
//! 2. [`ExclusionRule::NonGetMethod`] — anything that is not a read
//! 3. [`ExclusionRule::SchemePrefix`] — pseudo-schemes such as
//!    `chrome-extension`
//!
//! [`ExclusionRules::from_config`] always emits them in that order.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use shellcache_core::AppConfig;

use crate::request::InterceptedRequest;

/// A single predicate marking a request as "do not intercept".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Target host contains the substring (case-insensitive).
    HostContains(String),
    /// Request method is anything but GET.
    NonGetMethod,
    /// URL scheme starts with the prefix (case-insensitive).
    SchemePrefix(String),
}

impl ExclusionRule {
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        match self {
            ExclusionRule::HostContains(needle) => request
                .url
                .host_str()
                .is_some_and(|host| host.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())),
            ExclusionRule::NonGetMethod => request.method != Method::GET,
            ExclusionRule::SchemePrefix(prefix) => request
                .url
                .scheme()
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase()),
        }
    }
}

/// Ordered, immutable exclusion rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    rules: Vec<ExclusionRule>,
}

impl ExclusionRules {
    /// Build the rule list from configuration: hosts, then method, then schemes.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut rules: Vec<ExclusionRule> = config
            .excluded_hosts
            .iter()
            .filter(|host| !host.trim().is_empty())
            .map(|host| ExclusionRule::HostContains(host.trim().to_string()))
            .collect();
        rules.push(ExclusionRule::NonGetMethod);
        rules.extend(
            config
                .excluded_schemes
                .iter()
                .filter(|scheme| !scheme.trim().is_empty())
                .map(|scheme| ExclusionRule::SchemePrefix(scheme.trim().to_string())),
        );
        Self { rules }
    }

    /// Use an explicit list, evaluated in the given order.
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    /// The first rule matching `request`, if any.
    pub fn first_match(&self, request: &InterceptedRequest) -> Option<&ExclusionRule> {
        self.rules.iter().find(|rule| rule.matches(request))
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }
}
