//! TTL policy: how long each kind of content may be cached, and the matching
//! `Cache-Control` header for downstream caches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const INSTANT_HEADER: &str = "no-store, no-cache, must-revalidate, max-age=0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment `{other}`; expected `development` or `production`"
            )),
        }
    }
}

/// Kind of content being cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// A single collection item addressed by slug.
    Document,
    /// A collection index.
    Listing,
    /// A singleton such as a header, footer or site settings.
    Global,
}

impl ResourceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::Document => "document",
            ResourceClass::Listing => "listing",
            ResourceClass::Global => "global",
        }
    }
}

/// Production TTLs per resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySettings {
    pub environment: Environment,
    pub document_ttl_seconds: u64,
    pub listing_ttl_seconds: u64,
    pub global_ttl_seconds: u64,
    /// Stale-while-revalidate window as a multiple of the TTL.
    pub swr_multiplier: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            document_ttl_seconds: 300,
            listing_ttl_seconds: 60,
            global_ttl_seconds: 3600,
            swr_multiplier: 2,
        }
    }
}

impl PolicySettings {
    fn ttl_for(&self, class: ResourceClass) -> u64 {
        match class {
            ResourceClass::Document => self.document_ttl_seconds,
            ResourceClass::Listing => self.listing_ttl_seconds,
            ResourceClass::Global => self.global_ttl_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl_seconds: u64,
    pub cache_control: String,
}

impl CachePolicy {
    fn instant() -> Self {
        Self {
            ttl_seconds: 0,
            cache_control: INSTANT_HEADER.to_string(),
        }
    }

    /// A zero TTL means "do not cache at all".
    pub fn bypasses_cache(&self) -> bool {
        self.ttl_seconds == 0
    }
}

/// Pick the policy for `class` in `environment`.
pub fn policy_for(
    environment: Environment,
    class: ResourceClass,
    settings: &PolicySettings,
) -> CachePolicy {
    if environment == Environment::Development {
        return CachePolicy::instant();
    }

    let ttl = settings.ttl_for(class);
    if ttl == 0 {
        return CachePolicy::instant();
    }

    let swr = ttl.saturating_mul(settings.swr_multiplier.max(2));
    CachePolicy {
        ttl_seconds: ttl,
        cache_control: format!("public, max-age=0, s-maxage={ttl}, stale-while-revalidate={swr}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_is_instant_for_every_class() {
        let settings = PolicySettings::default();
        for class in [
            ResourceClass::Document,
            ResourceClass::Listing,
            ResourceClass::Global,
        ] {
            let policy = policy_for(Environment::Development, class, &settings);
            assert_eq!(policy.ttl_seconds, 0);
            assert_eq!(policy.cache_control, INSTANT_HEADER);
            assert!(policy.bypasses_cache());
        }
    }

    #[test]
    fn production_defaults() {
        let settings = PolicySettings::default();
        let listing = policy_for(Environment::Production, ResourceClass::Listing, &settings);
        assert_eq!(listing.ttl_seconds, 60);
        assert_eq!(
            listing.cache_control,
            "public, max-age=0, s-maxage=60, stale-while-revalidate=120"
        );

        let global = policy_for(Environment::Production, ResourceClass::Global, &settings);
        assert_eq!(global.ttl_seconds, 3600);
        assert!(global.cache_control.ends_with("stale-while-revalidate=7200"));

        let document = policy_for(Environment::Production, ResourceClass::Document, &settings);
        assert_eq!(document.ttl_seconds, 300);
    }

    #[test]
    fn swr_window_is_at_least_twice_the_ttl() {
        let settings = PolicySettings {
            swr_multiplier: 1,
            ..Default::default()
        };
        let policy = policy_for(Environment::Production, ResourceClass::Listing, &settings);
        assert!(policy.cache_control.ends_with("stale-while-revalidate=120"));
    }

    #[test]
    fn zero_production_ttl_falls_back_to_instant() {
        let settings = PolicySettings {
            listing_ttl_seconds: 0,
            ..Default::default()
        };
        let policy = policy_for(Environment::Production, ResourceClass::Listing, &settings);
        assert!(policy.bypasses_cache());
        assert_eq!(policy.cache_control, INSTANT_HEADER);
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert_eq!(" Production ".parse::<Environment>(), Ok(Environment::Production));
        assert!("staging".parse::<Environment>().is_err());
    }
}
