// ==========================================
// VitalVida Sync Pipeline - zone resolver
// ==========================================
// Input: free-text DA location ("Shop 12, Allen Avenue, Ikeja")
// Output: Zone
// Rule: case-insensitive keyword containment; the longest
//       matching keyword wins; no match -> Unassigned
// ==========================================

use crate::domain::zone::Zone;
use std::collections::HashMap;

/// Built-in keyword table
const DEFAULT_KEYWORDS: &[(Zone, &[&str])] = &[
    (
        Zone::LagosMainland,
        &[
            "ikeja", "yaba", "surulere", "maryland", "ogba", "agege", "ikorodu", "oshodi",
            "mushin", "festac", "egbeda", "gbagada", "ojodu", "berger", "lagos mainland",
        ],
    ),
    (
        Zone::LagosIsland,
        &[
            "lekki", "ikoyi", "victoria island", "ajah", "obalende", "lagos island", "oniru",
            "chevron", "sangotedo",
        ],
    ),
    (
        Zone::Abuja,
        &[
            "abuja", "wuse", "garki", "maitama", "asokoro", "gwarinpa", "kubwa", "jabi", "fct",
            "lugbe",
        ],
    ),
    (
        Zone::PortHarcourt,
        &[
            "port harcourt", "portharcourt", "rumuokoro", "rumuola", "trans amadi", "d-line",
            "gra phase", "choba",
        ],
    ),
    (
        Zone::Ibadan,
        &["ibadan", "bodija", "dugbe", "challenge", "ring road", "mokola", "akobo"],
    ),
    (Zone::Kano, &["kano", "sabon gari", "nassarawa", "tarauni", "fagge"]),
    (
        Zone::Enugu,
        &["enugu", "independence layout", "new haven", "trans ekulu", "achara layout"],
    ),
    (
        Zone::BeninCity,
        &["benin city", "benin", "ugbowo", "sapele road", "ikpoba", "uselu"],
    ),
];

// ==========================================
// ZoneResolver
// ==========================================
#[derive(Debug, Clone)]
pub struct ZoneResolver {
    /// (keyword, zone), lowercase
    keywords: Vec<(String, Zone)>,
}

impl ZoneResolver {
    /// Resolver over the built-in keyword table
    pub fn new() -> Self {
        Self::with_overrides(&HashMap::new())
    }

    /// Built-in table where each overridden zone's keywords are replaced
    pub fn with_overrides(overrides: &HashMap<Zone, Vec<String>>) -> Self {
        let mut keywords = Vec::new();
        for (zone, defaults) in DEFAULT_KEYWORDS {
            match overrides.get(zone) {
                Some(custom) => {
                    keywords.extend(custom.iter().map(|k| (k.trim().to_lowercase(), *zone)));
                }
                None => {
                    keywords.extend(defaults.iter().map(|k| (k.to_string(), *zone)));
                }
            }
        }
        keywords.retain(|(k, _)| !k.is_empty());

        Self { keywords }
    }

    pub fn resolve(&self, location: &str) -> Zone {
        let haystack = normalize(location);
        if haystack.is_empty() {
            return Zone::Unassigned;
        }

        self.keywords
            .iter()
            .filter(|(keyword, _)| haystack.contains(keyword.as_str()))
            .max_by_key(|(keyword, _)| keyword.len())
            .map(|(_, zone)| *zone)
            .unwrap_or(Zone::Unassigned)
    }
}

impl Default for ZoneResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, punctuation to spaces, collapse whitespace
fn normalize(location: &str) -> String {
    let cleaned: String = location
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
