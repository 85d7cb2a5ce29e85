//! Cooldown persistence. Containers are sled trees, optionally namespaced by a
//! prefix so several servers can share one database.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::SledGuildStore;
use crate::errors::GuildError;

const COOLDOWN_TREE: &str = "cooldowns";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    pub cooldown_type: String,
    pub owner: String,
    /// Epoch millis at which the cooldown ends.
    pub expiry: i64,
}

impl Cooldown {
    pub fn new(cooldown_type: &str, owner: &str, expiry: i64) -> Self {
        Self {
            cooldown_type: cooldown_type.to_string(),
            owner: owner.to_string(),
            expiry,
        }
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }

    /// Millis left before expiry, zero once expired.
    pub fn remaining_millis(&self, now_millis: i64) -> i64 {
        (self.expiry - now_millis).max(0)
    }
}

pub trait CooldownStore: Send + Sync {
    fn create_container(&self, prefix: Option<&str>) -> Result<(), GuildError>;
    fn exists(&self, prefix: Option<&str>, cooldown_type: &str, owner: &str) -> Result<bool, GuildError>;
    fn get_all(&self, prefix: Option<&str>) -> Result<Vec<Cooldown>, GuildError>;
    fn create(
        &self,
        prefix: Option<&str>,
        cooldown_type: &str,
        owner: &str,
        expiry: i64,
    ) -> Result<(), GuildError>;
    fn delete(&self, prefix: Option<&str>, cooldown_type: &str, owner: &str) -> Result<(), GuildError>;
}

fn container_name(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}{}", p, COOLDOWN_TREE),
        _ => COOLDOWN_TREE.to_string(),
    }
}

fn cooldown_key(cooldown_type: &str, owner: &str) -> Vec<u8> {
    format!("{}:{}", cooldown_type, owner).into_bytes()
}

impl SledGuildStore {
    fn cooldown_tree(&self, prefix: Option<&str>) -> Result<sled::Tree, GuildError> {
        Ok(self.db().open_tree(container_name(prefix))?)
    }
}

impl CooldownStore for SledGuildStore {
    fn create_container(&self, prefix: Option<&str>) -> Result<(), GuildError> {
        self.cooldown_tree(prefix)?;
        Ok(())
    }

    fn exists(&self, prefix: Option<&str>, cooldown_type: &str, owner: &str) -> Result<bool, GuildError> {
        let tree = self.cooldown_tree(prefix)?;
        Ok(tree.contains_key(cooldown_key(cooldown_type, owner))?)
    }

    fn get_all(&self, prefix: Option<&str>) -> Result<Vec<Cooldown>, GuildError> {
        let tree = self.cooldown_tree(prefix)?;
        tree.iter()
            .map(|entry| -> Result<Cooldown, GuildError> {
                let (_, value) = entry?;
                Ok(bincode::deserialize::<Cooldown>(&value)?)
            })
            .collect()
    }

    fn create(
        &self,
        prefix: Option<&str>,
        cooldown_type: &str,
        owner: &str,
        expiry: i64,
    ) -> Result<(), GuildError> {
        let tree = self.cooldown_tree(prefix)?;
        let record = Cooldown::new(cooldown_type, owner, expiry);
        tree.insert(cooldown_key(cooldown_type, owner), bincode::serialize(&record)?)?;
        tree.flush()?;
        Ok(())
    }

    fn delete(&self, prefix: Option<&str>, cooldown_type: &str, owner: &str) -> Result<(), GuildError> {
        let tree = self.cooldown_tree(prefix)?;
        tree.remove(cooldown_key(cooldown_type, owner))?;
        tree.flush()?;
        Ok(())
    }
}
