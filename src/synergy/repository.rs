//! Gem repository contract and an in-memory implementation.

use super::{GemStats, SupportGemEffect};
use crate::error::Result;
use crate::util::name_key;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read-only source of skill and support gem definitions.
#[async_trait]
pub trait GemRepository: Send + Sync {
    /// Case-insensitive exact match on the skill name.
    async fn get_skill(&self, name: &str) -> Result<Option<GemStats>>;

    /// Supports with no required tags, or sharing at least one tag with `skill_tags`.
    async fn list_compatible_supports(
        &self,
        skill_tags: &[String],
    ) -> Result<Vec<SupportGemEffect>>;
}

/// Skill and support definitions as stored in a catalog JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GemCatalog {
    #[serde(default)]
    pub skills: Vec<GemStats>,
    #[serde(default)]
    pub supports: Vec<SupportGemEffect>,
}

impl GemCatalog {
    pub fn from_json_str(s: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(s).map_err(|e| e.to_string())
    }

    pub fn load(path: &Path) -> std::result::Result<Self, String> {
        let s = crate::util::read_input_file(path)?;
        Self::from_json_str(&s)
    }
}

/// Repository over an in-memory catalog. Keeps catalog order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGemRepository {
    catalog: GemCatalog,
}

impl InMemoryGemRepository {
    pub fn new(catalog: GemCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl GemRepository for InMemoryGemRepository {
    async fn get_skill(&self, name: &str) -> Result<Option<GemStats>> {
        let key = name_key(name);
        Ok(self
            .catalog
            .skills
            .iter()
            .find(|s| name_key(&s.name) == key)
            .cloned())
    }

    async fn list_compatible_supports(
        &self,
        skill_tags: &[String],
    ) -> Result<Vec<SupportGemEffect>> {
        Ok(self
            .catalog
            .supports
            .iter()
            .filter(|s| s.is_compatible_with(skill_tags))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "skills": [
            {"name": "Fireball", "tags": ["Spell", "Fire", "Projectile"],
             "base_damage": {"min": 10, "max": 20}, "damage_type": "fire", "cast_time": 1.0}
        ],
        "supports": [
            {"name": "Generic", "spirit_cost": 5},
            {"name": "Spell Only", "required_tags": ["spell"]},
            {"name": "Melee Only", "required_tags": ["Melee"]}
        ]
    }"#;

    #[tokio::test]
    async fn skill_lookup_is_case_insensitive() {
        let repo = InMemoryGemRepository::new(GemCatalog::from_json_str(CATALOG).unwrap());
        let skill = repo.get_skill("  fireBALL ").await.unwrap().unwrap();
        assert_eq!(skill.name, "Fireball");
        assert!(repo.get_skill("Fire").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compatible_supports_filtered_by_tags() {
        let repo = InMemoryGemRepository::new(GemCatalog::from_json_str(CATALOG).unwrap());
        let tags = vec!["Spell".to_string(), "Fire".to_string()];
        let names: Vec<String> = repo
            .list_compatible_supports(&tags)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Generic".to_string(), "Spell Only".to_string()]);
    }

    #[test]
    fn catalog_defaults() {
        let c = GemCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(c.supports[1].mana_multiplier, 100.0);
        assert!(c.supports[0].required_tags.is_empty());
        assert!(GemCatalog::from_json_str("{not json").is_err());
    }
}
