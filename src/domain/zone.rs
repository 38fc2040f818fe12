// ==========================================
// VitalVida Sync Pipeline - delivery zones
// ==========================================
// Zones are derived from free-text DA locations by
// engine::zone_resolver; this module only defines the set.
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    LagosMainland,
    LagosIsland,
    Abuja,
    PortHarcourt,
    Ibadan,
    Kano,
    Enugu,
    BeninCity,
    Unassigned,
}

impl Zone {
    /// Every routable zone (excludes `Unassigned`)
    pub const ROUTABLE: [Zone; 8] = [
        Zone::LagosMainland,
        Zone::LagosIsland,
        Zone::Abuja,
        Zone::PortHarcourt,
        Zone::Ibadan,
        Zone::Kano,
        Zone::Enugu,
        Zone::BeninCity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::LagosMainland => "LAGOS_MAINLAND",
            Zone::LagosIsland => "LAGOS_ISLAND",
            Zone::Abuja => "ABUJA",
            Zone::PortHarcourt => "PORT_HARCOURT",
            Zone::Ibadan => "IBADAN",
            Zone::Kano => "KANO",
            Zone::Enugu => "ENUGU",
            Zone::BeninCity => "BENIN_CITY",
            Zone::Unassigned => "UNASSIGNED",
        }
    }

    /// Unknown codes map to `Unassigned`
    pub fn parse(s: &str) -> Self {
        let upper = s.trim().to_uppercase();
        Self::ROUTABLE
            .iter()
            .copied()
            .find(|z| z.as_str() == upper)
            .unwrap_or(Zone::Unassigned)
    }

    pub fn is_assigned(&self) -> bool {
        !matches!(self, Zone::Unassigned)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for z in Zone::ROUTABLE {
            assert_eq!(Zone::parse(z.as_str()), z);
        }
        assert_eq!(Zone::parse("atlantis"), Zone::Unassigned);
        assert!(!Zone::Unassigned.is_assigned());
    }
}
