//! Badge reference data: definitions, rarity tiers, and the catalog loaded once per session.

mod catalog;
mod domain;

pub use catalog::{BadgeCatalog, CatalogImportError};
pub use domain::{BadgeDefinition, BadgeId, BadgeRarity, RESERVED_BADGE_KEYS};
