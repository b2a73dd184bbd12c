use serde::{Deserialize, Serialize};
use std::fmt;

/// Badge keys that are granted out of band and must never be offered for nomination.
pub const RESERVED_BADGE_KEYS: [&str; 2] = ["app_creator", "wacho_patron"];

/// Identifier wrapper for badge definitions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeId(pub String);

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl BadgeRarity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "common" => Some(Self::Common),
            "rare" => Some(Self::Rare),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color_gradient: String,
    pub rarity: BadgeRarity,
    pub is_active: bool,
}

impl BadgeDefinition {
    pub fn is_reserved(&self) -> bool {
        RESERVED_BADGE_KEYS.contains(&self.key.as_str())
    }

    /// Whether attendees may nominate each other for this badge.
    pub fn is_assignable(&self) -> bool {
        self.is_active && !self.is_reserved()
    }
}
