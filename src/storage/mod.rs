//! Persistence collaborators for guilds and cooldowns.
//!
//! The registry only depends on the [`GuildStore`] and [`CooldownStore`]
//! traits. [`SledGuildStore`] implements both on an embedded sled database
//! with bincode-encoded, schema-versioned records.

pub mod cooldowns;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;
use sled::IVec;

use crate::errors::GuildError;
use crate::guild::{Guild, GUILD_SCHEMA_VERSION};

pub use cooldowns::{Cooldown, CooldownStore};

const TREE_GUILDS: &str = "guilds";
const GUILD_KEY_PREFIX: &[u8] = b"guilds:";

/// Storage contract the registry requires: load everything, replace everything,
/// delete one.
pub trait GuildStore: Send + Sync {
    fn load_all_guilds(&self) -> Result<Vec<Guild>, GuildError>;

    /// Replace the stored guild collection with `guilds`.
    fn save_all_guilds(&self, guilds: &[Guild]) -> Result<(), GuildError>;

    fn delete_guild(&self, id: &str) -> Result<(), GuildError>;
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledGuildStoreBuilder {
    path: PathBuf,
}

impl SledGuildStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<SledGuildStore, GuildError> {
        SledGuildStore::open(self.path)
    }
}

/// Sled-backed persistence for guild records and cooldown containers.
pub struct SledGuildStore {
    db: sled::Db,
    guilds: sled::Tree,
}

impl SledGuildStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GuildError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let guilds = db.open_tree(TREE_GUILDS)?;
        Ok(Self { db, guilds })
    }

    fn guild_key(id: &str) -> Vec<u8> {
        format!("guilds:{}", id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, GuildError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &IVec) -> Result<T, GuildError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    pub(crate) fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Fetch a single guild record by id.
    pub fn get_guild(&self, id: &str) -> Result<Guild, GuildError> {
        let Some(bytes) = self.guilds.get(Self::guild_key(id))? else {
            return Err(GuildError::NotFound(format!("guild: {}", id)));
        };
        let guild: Guild = Self::deserialize(&bytes)?;
        Self::check_schema(&guild)?;
        Ok(guild)
    }

    /// Insert or update one guild record.
    pub fn put_guild(&self, guild: &Guild) -> Result<(), GuildError> {
        let bytes = Self::serialize(guild)?;
        self.guilds.insert(Self::guild_key(&guild.id.to_string()), bytes)?;
        self.guilds.flush()?;
        Ok(())
    }

    fn check_schema(guild: &Guild) -> Result<(), GuildError> {
        if guild.schema_version != GUILD_SCHEMA_VERSION {
            return Err(GuildError::SchemaMismatch {
                entity: "guild",
                expected: GUILD_SCHEMA_VERSION,
                found: guild.schema_version,
            });
        }
        Ok(())
    }
}

impl GuildStore for SledGuildStore {
    fn load_all_guilds(&self) -> Result<Vec<Guild>, GuildError> {
        let mut guilds = Vec::new();
        for entry in self.guilds.scan_prefix(GUILD_KEY_PREFIX) {
            let (_, value) = entry?;
            let guild: Guild = Self::deserialize(&value)?;
            Self::check_schema(&guild)?;
            guilds.push(guild);
        }
        debug!("Loaded {} guild records", guilds.len());
        Ok(guilds)
    }

    fn save_all_guilds(&self, guilds: &[Guild]) -> Result<(), GuildError> {
        let mut batch = sled::Batch::default();
        let mut keep = HashSet::with_capacity(guilds.len());
        for guild in guilds {
            let mut record = guild.clone();
            record.schema_version = GUILD_SCHEMA_VERSION;
            let key = Self::guild_key(&record.id.to_string());
            batch.insert(key.clone(), Self::serialize(&record)?);
            keep.insert(key);
        }
        for entry in self.guilds.scan_prefix(GUILD_KEY_PREFIX) {
            let (key, _) = entry?;
            if !keep.contains(&key[..]) {
                batch.remove(key);
            }
        }
        self.guilds.apply_batch(batch)?;
        self.guilds.flush()?;
        debug!("Saved {} guild records", guilds.len());
        Ok(())
    }

    fn delete_guild(&self, id: &str) -> Result<(), GuildError> {
        self.guilds.remove(Self::guild_key(id))?;
        self.guilds.flush()?;
        Ok(())
    }
}
