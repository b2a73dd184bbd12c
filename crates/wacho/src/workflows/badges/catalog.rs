use super::domain::{BadgeDefinition, BadgeId, BadgeRarity};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum CatalogImportError {
    #[error("failed to read badge catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid badge catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("badge '{key}' has unknown rarity '{value}'")]
    UnknownRarity { key: String, value: String },
    #[error("badge key '{key}' appears more than once")]
    DuplicateKey { key: String },
}

/// Read-only set of badge definitions, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct BadgeCatalog {
    definitions: Vec<BadgeDefinition>,
}

impl BadgeCatalog {
    pub fn new(definitions: Vec<BadgeDefinition>) -> Self {
        Self { definitions }
    }

    /// Built-in catalog used when no CSV export is configured.
    pub fn standard() -> Self {
        #[rustfmt::skip]
        let rows: [(&str, &str, &str, &str, &str, BadgeRarity); 12] = [
            ("app_creator", "App Creator", "Built the app you are using", "code", "from-slate-700 to-slate-900", BadgeRarity::Legendary),
            ("wacho_patron", "Wacho Patron", "Supports the community behind the scenes", "crown", "from-amber-400 to-yellow-600", BadgeRarity::Legendary),
            ("party_animal", "Party Animal", "Last one standing every night", "flame", "from-orange-500 to-red-600", BadgeRarity::Common),
            ("best_dancer", "Best Dancer", "Owned the dance floor", "music", "from-pink-500 to-fuchsia-600", BadgeRarity::Common),
            ("camp_chef", "Camp Chef", "Kept the crew fed", "utensils", "from-lime-500 to-green-600", BadgeRarity::Common),
            ("navigator", "Navigator", "Always knew which stage was next", "compass", "from-sky-500 to-blue-600", BadgeRarity::Rare),
            ("hype_master", "Hype Master", "Turned every set into a moment", "megaphone", "from-violet-500 to-purple-700", BadgeRarity::Rare),
            ("early_bird", "Early Bird", "First in line at the gates", "sunrise", "from-yellow-300 to-orange-400", BadgeRarity::Common),
            ("photographer", "Photographer", "Captured the best memories", "camera", "from-teal-400 to-cyan-600", BadgeRarity::Rare),
            ("good_vibes", "Good Vibes", "Made everyone feel welcome", "heart", "from-rose-400 to-pink-500", BadgeRarity::Epic),
            ("survivor", "Survivor", "Made it through rain, mud and heat", "shield", "from-stone-500 to-stone-700", BadgeRarity::Epic),
            ("legend", "Festival Legend", "The story everyone tells afterwards", "trophy", "from-amber-500 to-red-500", BadgeRarity::Legendary),
        ];

        let definitions = rows
            .into_iter()
            .enumerate()
            .map(|(index, (key, name, description, icon, gradient, rarity))| BadgeDefinition {
                id: BadgeId(format!("badge-{:02}", index + 1)),
                key: key.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                icon: icon.to_string(),
                color_gradient: gradient.to_string(),
                rarity,
                is_active: true,
            })
            .collect();

        Self { definitions }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parses `id,key,name,description,icon,color_gradient,rarity,is_active` rows.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut seen = HashSet::new();
        let mut definitions = Vec::new();

        for record in csv_reader.deserialize::<CatalogRow>() {
            let row = record?;
            if !seen.insert(row.key.clone()) {
                return Err(CatalogImportError::DuplicateKey { key: row.key });
            }

            let rarity = BadgeRarity::parse(&row.rarity).ok_or_else(|| {
                CatalogImportError::UnknownRarity {
                    key: row.key.clone(),
                    value: row.rarity.clone(),
                }
            })?;

            definitions.push(BadgeDefinition {
                id: BadgeId(row.id),
                key: row.key,
                name: row.name,
                description: row.description.unwrap_or_default(),
                icon: row.icon.unwrap_or_default(),
                color_gradient: row.color_gradient.unwrap_or_default(),
                rarity,
                is_active: row.is_active.unwrap_or(true),
            });
        }

        Ok(Self { definitions })
    }

    pub fn definitions(&self) -> &[BadgeDefinition] {
        &self.definitions
    }

    pub fn assignable(&self) -> impl Iterator<Item = &BadgeDefinition> {
        self.definitions.iter().filter(|badge| badge.is_assignable())
    }

    pub fn get(&self, id: &BadgeId) -> Option<&BadgeDefinition> {
        self.definitions.iter().find(|badge| &badge.id == id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: String,
    key: String,
    name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    icon: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    color_gradient: Option<String>,
    rarity: String,
    #[serde(default)]
    is_active: Option<bool>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
