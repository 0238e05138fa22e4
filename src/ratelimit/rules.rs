//! Route policy rules configuration and matching.
//!
//! Callers normally pass limits per call site. This module lets a deployment
//! keep them in a YAML table instead, keyed by route-key patterns such as
//! `plans:*:PATCH`, where `*` matches exactly one `:`-separated segment.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::limiter::RateLimitOptions;
use crate::error::{Result, TurnstileError};

/// Default limit applied when no rule matches.
const DEFAULT_LIMIT: u32 = 60;
/// Default window applied when no rule matches.
const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Wildcard segment in a route pattern.
const WILDCARD: &str = "*";

/// A rule table shared between request handlers and the reload task.
pub type SharedRules = Arc<RwLock<RouteRules>>;

/// A complete rule table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRules {
    /// Policy used when no route pattern matches
    #[serde(default)]
    pub default: RoutePolicy,
    /// Route-specific rules, in priority order for equally specific matches
    #[serde(default)]
    pub routes: Vec<RouteRule>,
}

/// A route pattern with its policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    /// `:`-separated route key pattern
    pub pattern: String,
    /// Policy applied to matching route keys
    #[serde(flatten)]
    pub policy: RoutePolicy,
}

/// A limit and window pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Maximum admitted requests per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl RoutePolicy {
    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Build limiter options for a route key under this policy.
    pub fn options_for(&self, key: Option<&str>) -> RateLimitOptions {
        RateLimitOptions {
            limit: self.limit,
            window: self.window(),
            key: key.map(str::to_string),
        }
    }
}

impl RouteRules {
    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading route rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RouteRules = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Rules(format!("Failed to parse route rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<()> {
        if self.default.window_ms == 0 {
            return Err(TurnstileError::Rules(
                "default policy window_ms must be positive".to_string(),
            ));
        }

        for rule in &self.routes {
            if rule.pattern.trim().is_empty() {
                return Err(TurnstileError::Rules("route pattern must not be empty".to_string()));
            }
            if rule.policy.window_ms == 0 {
                return Err(TurnstileError::Rules(format!(
                    "route {} window_ms must be positive",
                    rule.pattern
                )));
            }
        }

        Ok(())
    }

    /// Find the policy for a route key.
    ///
    /// The matching rule with the fewest wildcards wins; ties go to the
    /// earlier rule. Without a key, or without a match, the default policy
    /// applies.
    pub fn policy_for(&self, key: Option<&str>) -> RoutePolicy {
        let Some(key) = key else {
            return self.default;
        };

        let segments: Vec<&str> = key.split(':').collect();
        let mut best_match: Option<(usize, &RouteRule)> = None;

        for rule in &self.routes {
            let Some(wildcards) = match_pattern(&rule.pattern, &segments) else {
                continue;
            };

            let more_specific = best_match.map_or(true, |(best, _)| wildcards < best);
            if more_specific {
                best_match = Some((wildcards, rule));
            }
        }

        best_match.map_or(self.default, |(_, rule)| rule.policy)
    }

    /// Build limiter options for a route key.
    pub fn options_for(&self, key: Option<&str>) -> RateLimitOptions {
        self.policy_for(key).options_for(key)
    }
}

/// Match a pattern against route key segments.
///
/// Returns the number of wildcard segments used, or `None` on mismatch.
fn match_pattern(pattern: &str, segments: &[&str]) -> Option<usize> {
    let parts: Vec<&str> = pattern.split(':').collect();
    if parts.len() != segments.len() {
        return None;
    }

    let mut wildcards = 0;
    for (part, segment) in parts.iter().zip(segments) {
        if *part == WILDCARD {
            wildcards += 1;
        } else if part != segment {
            return None;
        }
    }

    Some(wildcards)
}
