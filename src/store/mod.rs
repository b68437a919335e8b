//! SQLite persistence for skill and support gem definitions.

use crate::error::CalcError;
use crate::synergy::{GemCatalog, GemRepository, GemStats, SupportGemEffect};
use crate::util::name_key;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL,
    skill_count INTEGER NOT NULL,
    support_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS skill_gems (
    name_key TEXT PRIMARY KEY,
    gem_json TEXT NOT NULL,
    import_id INTEGER NOT NULL REFERENCES imports(id)
);

CREATE TABLE IF NOT EXISTS support_gems (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    name_key TEXT NOT NULL UNIQUE,
    gem_json TEXT NOT NULL,
    import_id INTEGER NOT NULL REFERENCES imports(id)
);
";

/// One recorded catalog import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub id: i64,
    pub source: String,
    pub created_at: String,
    pub skill_count: i64,
    pub support_count: i64,
}

/// Gem catalog in a SQLite file. Lookups are by lowercase name.
pub struct GemStore {
    conn: Mutex<Connection>,
}

impl GemStore {
    pub fn open(path: &Path) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| e.to_string())?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(SCHEMA).map_err(|e| e.to_string())?;
        Ok(GemStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace every gem in the catalog. Support order follows
    /// first import; re-importing a support updates it in place. Nothing is
    /// written when any gem fails validation.
    pub fn import_catalog(&self, source: &str, catalog: &GemCatalog) -> Result<i64, String> {
        for s in &catalog.skills {
            s.validate().map_err(|e| format!("skill {}: {}", s.name, e))?;
        }
        for s in &catalog.supports {
            s.validate().map_err(|e| format!("support {}: {}", s.name, e))?;
        }
        let now: DateTime<Utc> = Utc::now();
        let created = now.to_rfc3339();
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "INSERT INTO imports (source, created_at, skill_count, support_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                source,
                created,
                catalog.skills.len() as i64,
                catalog.supports.len() as i64
            ],
        )
        .map_err(|e| e.to_string())?;
        let id = tx.last_insert_rowid();
        {
            let mut skill_stmt = tx
                .prepare(
                    "INSERT INTO skill_gems (name_key, gem_json, import_id) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name_key) DO UPDATE
                     SET gem_json = excluded.gem_json, import_id = excluded.import_id",
                )
                .map_err(|e| e.to_string())?;
            for s in &catalog.skills {
                let json = serde_json::to_string(s).map_err(|e| e.to_string())?;
                skill_stmt
                    .execute(params![name_key(&s.name), json, id])
                    .map_err(|e| e.to_string())?;
            }
            let mut support_stmt = tx
                .prepare(
                    "INSERT INTO support_gems (name_key, gem_json, import_id) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name_key) DO UPDATE
                     SET gem_json = excluded.gem_json, import_id = excluded.import_id",
                )
                .map_err(|e| e.to_string())?;
            for s in &catalog.supports {
                let json = serde_json::to_string(s).map_err(|e| e.to_string())?;
                support_stmt
                    .execute(params![name_key(&s.name), json, id])
                    .map_err(|e| e.to_string())?;
            }
        }
        tx.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    pub fn get_skill(&self, name: &str) -> Result<Option<GemStats>, String> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT gem_json FROM skill_gems WHERE name_key = ?1",
                params![name_key(name)],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        json.map(|j| serde_json::from_str(&j).map_err(|e| e.to_string()))
            .transpose()
    }

    pub fn list_skills(&self) -> Result<Vec<GemStats>, String> {
        self.load_json_rows("SELECT gem_json FROM skill_gems ORDER BY name_key")
    }

    /// All supports in import order.
    pub fn list_supports(&self) -> Result<Vec<SupportGemEffect>, String> {
        self.load_json_rows("SELECT gem_json FROM support_gems ORDER BY seq")
    }

    pub fn list_imports(&self) -> Result<Vec<ImportRecord>, String> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, source, created_at, skill_count, support_count
                 FROM imports ORDER BY id DESC",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |r| {
                Ok(ImportRecord {
                    id: r.get(0)?,
                    source: r.get(1)?,
                    created_at: r.get(2)?,
                    skill_count: r.get(3)?,
                    support_count: r.get(4)?,
                })
            })
            .map_err(|e| e.to_string())?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| e.to_string())?);
        }
        Ok(out)
    }

    fn load_json_rows<T: serde::de::DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, String> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(|e| e.to_string())?;
        let mut out = Vec::new();
        for row in rows {
            let json: String = row.map_err(|e| e.to_string())?;
            out.push(serde_json::from_str(&json).map_err(|e| e.to_string())?);
        }
        Ok(out)
    }
}

#[async_trait]
impl GemRepository for GemStore {
    async fn get_skill(&self, name: &str) -> crate::error::Result<Option<GemStats>> {
        GemStore::get_skill(self, name).map_err(CalcError::Repository)
    }

    async fn list_compatible_supports(
        &self,
        skill_tags: &[String],
    ) -> crate::error::Result<Vec<SupportGemEffect>> {
        let supports = self.list_supports().map_err(CalcError::Repository)?;
        Ok(supports
            .into_iter()
            .filter(|s| s.is_compatible_with(skill_tags))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::{DamageRange, DamageType, Modifier, ModifierKind};

    fn catalog() -> GemCatalog {
        GemCatalog::from_json_str(
            r#"{
            "skills": [
                {"name": "Spark", "tags": ["Spell", "Lightning"],
                 "base_damage": {"min": 2, "max": 30}, "damage_type": "lightning",
                 "cast_time": 0.7, "mana_cost": 8}
            ],
            "supports": [
                {"name": "Zeta", "spirit_cost": 10},
                {"name": "Alpha", "required_tags": ["Attack"]},
                {"name": "Beta", "required_tags": ["lightning"]}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn import_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = GemStore::open(&dir.path().join("gems.sqlite")).unwrap();
        let id = store.import_catalog("test.json", &catalog()).unwrap();
        let spark = store.get_skill("SPARK").unwrap().unwrap();
        assert_eq!(spark.damage_type, DamageType::Lightning);
        assert_eq!(spark.base_damage, DamageRange { min: 2.0, max: 30.0 });
        assert!(store.get_skill("Arc").unwrap().is_none());
        let names: Vec<String> = store
            .list_supports()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Beta"]);
        let imports = store.list_imports().unwrap();
        assert_eq!(imports[0].id, id);
        assert_eq!(imports[0].support_count, 3);
    }

    #[test]
    fn reimport_updates_in_place() {
        let store = GemStore::open_in_memory().unwrap();
        store.import_catalog("a", &catalog()).unwrap();
        let mut c = catalog();
        c.supports[0].spirit_cost = 99.0;
        store.import_catalog("b", &c).unwrap();
        let supports = store.list_supports().unwrap();
        assert_eq!(supports.len(), 3);
        assert_eq!(supports[0].name, "Zeta");
        assert_eq!(supports[0].spirit_cost, 99.0);
        assert_eq!(store.list_imports().unwrap().len(), 2);
        assert_eq!(store.list_skills().unwrap().len(), 1);
    }

    #[test]
    fn rejects_invalid_skill_range() {
        let store = GemStore::open_in_memory().unwrap();
        let mut c = catalog();
        c.skills[0].base_damage = DamageRange { min: 5.0, max: 1.0 };
        assert!(store.import_catalog("bad", &c).is_err());
        assert!(store.list_imports().unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_supports() {
        let store = GemStore::open_in_memory().unwrap();
        let mut c = catalog();
        c.supports[1].spirit_cost = -5.0;
        let err = store.import_catalog("bad", &c).unwrap_err();
        assert!(err.starts_with("support Alpha:"), "{}", err);

        let mut c = catalog();
        c.supports[2].added_damage = Some(DamageRange { min: 9.0, max: 3.0 });
        assert!(store.import_catalog("bad", &c).is_err());

        let mut c = catalog();
        c.supports[0].damage_modifiers = vec![Modifier {
            value: -50.0,
            kind: ModifierKind::More,
        }];
        assert!(store.import_catalog("bad", &c).is_err());

        assert!(store.list_imports().unwrap().is_empty());
        assert!(store.list_supports().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repository_filters_by_tags() {
        let store = GemStore::open_in_memory().unwrap();
        store.import_catalog("t", &catalog()).unwrap();
        let tags = vec!["Spell".to_string(), "Lightning".to_string()];
        let names: Vec<String> = GemRepository::list_compatible_supports(&store, &tags)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Zeta", "Beta"]);
        let skill = GemRepository::get_skill(&store, "spark").await.unwrap();
        assert!(skill.is_some());
    }
}
