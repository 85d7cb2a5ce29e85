//! Guild progression tiers and the tier catalog.
//!
//! Tiers come from `tiers.toml`:
//!
//! ```toml
//! [tiers.list.one]
//! level = 1
//! name = "Default"
//! max-members = 10
//! permissions = ["guilds.tier.one"]
//! ```
//!
//! Only `level` and `name` are required; every other attribute has a default.

use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::errors::GuildError;

#[derive(Debug, Clone, PartialEq)]
pub struct TierDefinition {
    pub level: i32,
    pub name: String,
    pub upgrade_cost: f64,
    pub max_members: u32,
    pub vault_slot_count: u32,
    pub mob_xp_multiplier: f64,
    pub damage_multiplier: f64,
    pub max_bank_balance: f64,
    /// Members needed before the guild may rank up. Zero disables the check.
    pub members_required_to_rank_up: u32,
    pub max_allies: u32,
    pub buffs_enabled: bool,
    pub granted_permissions: Vec<String>,
}

impl TierDefinition {
    pub fn new(level: i32, name: &str) -> Self {
        Self {
            level,
            name: name.to_string(),
            upgrade_cost: default_cost(),
            max_members: default_max_members(),
            vault_slot_count: default_vault_amount(),
            mob_xp_multiplier: default_multiplier(),
            damage_multiplier: default_multiplier(),
            max_bank_balance: default_max_bank_balance(),
            members_required_to_rank_up: default_members_to_rankup(),
            max_allies: default_max_allies(),
            buffs_enabled: true,
            granted_permissions: Vec::new(),
        }
    }
}

fn default_cost() -> f64 {
    1000.0
}
fn default_max_members() -> u32 {
    10
}
fn default_vault_amount() -> u32 {
    1
}
fn default_multiplier() -> f64 {
    1.0
}
fn default_max_bank_balance() -> f64 {
    10000.0
}
fn default_members_to_rankup() -> u32 {
    5
}
fn default_max_allies() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TierSeed {
    level: i32,
    name: String,
    #[serde(default = "default_cost")]
    cost: f64,
    #[serde(default = "default_max_members")]
    max_members: u32,
    #[serde(default = "default_vault_amount")]
    vault_amount: u32,
    #[serde(default = "default_multiplier")]
    mob_xp_multiplier: f64,
    #[serde(default = "default_multiplier")]
    damage_multiplier: f64,
    #[serde(default = "default_max_bank_balance")]
    max_bank_balance: f64,
    #[serde(default = "default_members_to_rankup")]
    members_to_rankup: u32,
    #[serde(default = "default_max_allies")]
    max_allies: u32,
    #[serde(default = "default_true")]
    use_buffs: bool,
    #[serde(default)]
    permissions: Vec<String>,
}

impl From<TierSeed> for TierDefinition {
    fn from(seed: TierSeed) -> Self {
        Self {
            level: seed.level,
            name: seed.name,
            upgrade_cost: seed.cost,
            max_members: seed.max_members,
            vault_slot_count: seed.vault_amount,
            mob_xp_multiplier: seed.mob_xp_multiplier,
            damage_multiplier: seed.damage_multiplier,
            max_bank_balance: seed.max_bank_balance,
            members_required_to_rank_up: seed.members_to_rankup,
            max_allies: seed.max_allies,
            buffs_enabled: seed.use_buffs,
            granted_permissions: seed.permissions,
        }
    }
}

/// Tiers sorted by ascending level. Never empty.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: Vec<TierDefinition>,
}

impl TierCatalog {
    pub fn from_definitions(definitions: Vec<TierDefinition>) -> Result<Self, GuildError> {
        let mut tiers: Vec<TierDefinition> = Vec::with_capacity(definitions.len());
        for def in definitions {
            if tiers.iter().any(|t| t.level == def.level) {
                warn!(
                    "Duplicate tier level {} ({}) ignored; keeping the first definition",
                    def.level, def.name
                );
                continue;
            }
            tiers.push(def);
        }
        if tiers.is_empty() {
            return Err(GuildError::EmptyCatalog("tier"));
        }
        tiers.sort_by_key(|t| t.level);
        Ok(Self { tiers })
    }

    /// Parse a `tiers.toml` document. Entries missing `level`/`name` or carrying
    /// values of the wrong type are skipped with a warning.
    pub fn from_toml_str(content: &str) -> Result<Self, GuildError> {
        let doc: toml::Table = toml::from_str(content)
            .map_err(|e| GuildError::ConfigParse(format!("tiers: {}", e)))?;
        let Some(list) = doc
            .get("tiers")
            .and_then(|v| v.get("list"))
            .and_then(|v| v.as_table())
        else {
            return Err(GuildError::ConfigParse(
                "tiers: missing [tiers.list] table".into(),
            ));
        };

        let mut definitions = Vec::new();
        for (key, value) in list {
            match value.clone().try_into::<TierSeed>() {
                Ok(seed) => definitions.push(TierDefinition::from(seed)),
                Err(e) => warn!("Skipping tier '{}': {}", key, e),
            }
        }
        Self::from_definitions(definitions)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GuildError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn find_by_level(&self, level: i32) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.level == level)
    }

    pub fn lowest(&self) -> &TierDefinition {
        &self.tiers[0]
    }

    pub fn max_level(&self) -> i32 {
        self.tiers[self.tiers.len() - 1].level
    }

    pub fn get_or_lowest(&self, level: i32) -> &TierDefinition {
        self.find_by_level(level).unwrap_or_else(|| self.lowest())
    }

    /// The first tier strictly above `level`, if any.
    pub fn next_after(&self, level: i32) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.level > level)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierDefinition> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Default `tiers.toml` written by `guildhall init`.
pub const DEFAULT_TIERS_TOML: &str = r#"[tiers.list.one]
level = 1
name = "Default"
cost = 1000.0
max-members = 10
vault-amount = 1
mob-xp-multiplier = 1.0
damage-multiplier = 1.0
max-bank-balance = 10000.0
members-to-rankup = 0
max-allies = 10
use-buffs = true
permissions = []

[tiers.list.two]
level = 2
name = "Advanced"
cost = 2500.0
max-members = 20
vault-amount = 2
mob-xp-multiplier = 1.5
damage-multiplier = 1.0
max-bank-balance = 25000.0
members-to-rankup = 5
max-allies = 15
use-buffs = true
permissions = ["guilds.tier.advanced"]

[tiers.list.three]
level = 3
name = "Master"
cost = 5000.0
max-members = 30
vault-amount = 3
mob-xp-multiplier = 2.0
damage-multiplier = 1.5
max-bank-balance = 50000.0
members-to-rankup = 10
max-allies = 20
use-buffs = true
permissions = ["guilds.tier.advanced", "guilds.tier.master"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tiers_parse_in_level_order() {
        let catalog = TierCatalog::from_toml_str(DEFAULT_TIERS_TOML).expect("tiers");
        let levels: Vec<i32> = catalog.iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![1, 2, 3]);
        assert_eq!(catalog.lowest().name, "Default");
        assert_eq!(catalog.max_level(), 3);
        assert_eq!(catalog.find_by_level(3).map(|t| t.vault_slot_count), Some(3));
    }

    #[test]
    fn omitted_attributes_use_defaults() {
        let catalog = TierCatalog::from_toml_str(
            "[tiers.list.a]\nlevel = 0\nname = \"Starter\"\n",
        )
        .expect("tiers");
        let tier = catalog.lowest();
        assert_eq!(tier.max_members, 10);
        assert_eq!(tier.members_required_to_rank_up, 5);
        assert_eq!(tier.max_bank_balance, 10000.0);
        assert!(tier.buffs_enabled);
        assert!(tier.granted_permissions.is_empty());
    }

    #[test]
    fn bad_entries_skipped() {
        let doc = r#"
[tiers.list.good]
level = 1
name = "Good"

[tiers.list.nolevel]
name = "No level"

[tiers.list.wrongtype]
level = "two"
name = "Wrong"
"#;
        let catalog = TierCatalog::from_toml_str(doc).expect("tiers");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn next_after_skips_gaps() {
        let catalog = TierCatalog::from_definitions(vec![
            TierDefinition::new(5, "Five"),
            TierDefinition::new(1, "One"),
        ])
        .expect("catalog");
        assert_eq!(catalog.next_after(1).map(|t| t.level), Some(5));
        assert!(catalog.next_after(5).is_none());
        assert_eq!(catalog.get_or_lowest(3).level, 1);
    }

    #[test]
    fn missing_list_is_config_error() {
        let err = TierCatalog::from_toml_str("[tiers]\nfoo = 1\n").unwrap_err();
        assert!(matches!(err, GuildError::ConfigParse(_)));
    }
}
