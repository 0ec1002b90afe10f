//! Service name registry
//!
//! Maps human service names to the two-letter abbreviations used in error
//! codes. The mapping is fixed at construction (built-in defaults plus
//! configured overrides). Unknown names seen at runtime go into a separate
//! lock-guarded set and get the reserved `NULL` prefix.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tideline_core::TidelineConfig;

/// Prefix used for services missing from the registry
pub const UNKNOWN_SERVICE_PREFIX: &str = "NULL";

/// Service assumed when a request does not name one
pub const DEFAULT_SERVICE: &str = "Tile";

static DEFAULT_ABBREVIATIONS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("Advanced Routing", "AR"),
        ("Arc GIS", "AG"),
        ("Authorization", "AZ"),
        ("Auto Assignments", "AA"),
        ("Email", "EM"),
        ("Geocoding", "GC"),
        ("Geometry", "GY"),
        ("GIS", "GS"),
        ("Images", "IG"),
        ("Live", "LV"),
        ("Tile", "TL"),
        ("Live Ingestions", "LI"),
        ("OAuth", "OA"),
        ("OEM", "OM"),
        ("Premium Data", "PD"),
        ("Routing/Scheduling", "RS"),
        ("Territories", "TR"),
        ("Thematic Mapping", "TM"),
    ]
    .into_iter()
    .collect()
});

/// Service abbreviation registry
#[derive(Debug)]
pub struct ServiceRegistry {
    abbreviations: BTreeMap<String, String>,
    unknown: RwLock<BTreeSet<String>>,
}

impl ServiceRegistry {
    /// Registry with the built-in abbreviations
    pub fn new() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }

    /// Built-in abbreviations plus overrides; overrides win
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut abbreviations: BTreeMap<String, String> = DEFAULT_ABBREVIATIONS
            .iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect();
        abbreviations.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            abbreviations,
            unknown: RwLock::new(BTreeSet::new()),
        }
    }

    /// Registry from the `[services]` config section
    pub fn from_config(config: &TidelineConfig) -> Self {
        Self::with_overrides(&config.services)
    }

    /// Abbreviation of a known service
    pub fn abbreviation(&self, service: &str) -> Option<&str> {
        self.abbreviations.get(service).map(String::as_str)
    }

    /// Error code prefix for a service; records unknown names
    pub fn prefix(&self, service: &str) -> &str {
        match self.abbreviation(service) {
            Some(code) => code,
            None => {
                self.record_unknown(service);
                UNKNOWN_SERVICE_PREFIX
            }
        }
    }

    fn record_unknown(&self, service: &str) {
        if self.unknown.read().contains(service) {
            return;
        }
        if self.unknown.write().insert(service.to_string()) {
            tracing::warn!(
                target: "tideline::error_code",
                service,
                "unknown service name"
            );
        }
    }

    /// Unknown service names seen so far, sorted
    pub fn unknown_services(&self) -> Vec<String> {
        self.unknown.read().iter().cloned().collect()
    }

    /// Number of known services
    pub fn len(&self) -> usize {
        self.abbreviations.len()
    }

    /// Check if no services are known
    pub fn is_empty(&self) -> bool {
        self.abbreviations.is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let registry = ServiceRegistry::new();
        assert_eq!(registry.len(), 18);
        assert_eq!(registry.prefix("Tile"), "TL");
        assert_eq!(registry.prefix("Routing/Scheduling"), "RS");
        assert_eq!(registry.prefix("Email"), "EM");
    }

    #[test]
    fn test_unknown_service_is_recorded_once() {
        let registry = ServiceRegistry::new();
        assert_eq!(registry.prefix("UnknownSvc"), UNKNOWN_SERVICE_PREFIX);
        assert_eq!(registry.prefix("UnknownSvc"), UNKNOWN_SERVICE_PREFIX);
        assert_eq!(registry.unknown_services(), vec!["UnknownSvc"]);
        assert!(registry.abbreviation("UnknownSvc").is_none());
    }

    #[test]
    fn test_overrides_win() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Tile".to_string(), "TX".to_string());
        overrides.insert("Billing".to_string(), "BL".to_string());
        let registry = ServiceRegistry::with_overrides(&overrides);
        assert_eq!(registry.prefix("Tile"), "TX");
        assert_eq!(registry.prefix("Billing"), "BL");
        assert_eq!(registry.len(), 19);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = ServiceRegistry::new();
        assert_eq!(registry.prefix("tile"), UNKNOWN_SERVICE_PREFIX);
    }

    #[test]
    fn test_concurrent_unknown_recording() {
        let registry = Arc::new(ServiceRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        registry.prefix(&format!("svc-{}", (i + j) % 10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.unknown_services().len(), 10);
    }
}
