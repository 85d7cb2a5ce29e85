//! Test utilities & fixtures.
//! Builds registries over throwaway sled stores with recording collaborators.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use guildhall::chat::ChatDelivery;
use guildhall::config::Config;
use guildhall::guild::{RoleCatalog, TierCatalog, DEFAULT_ROLES_TOML, DEFAULT_TIERS_TOML};
use guildhall::permissions::{PermissionPropagator, PermissionService};
use guildhall::registry::GuildRegistry;
use guildhall::storage::SledGuildStore;
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingPermissions {
    pub calls: Mutex<Vec<(String, Uuid, String)>>,
}

impl RecordingPermissions {
    pub fn nodes_for(&self, action: &str, subject: Uuid) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|(a, s, _)| a == action && *s == subject)
            .map(|(_, _, node)| node.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("calls").clear();
    }
}

impl PermissionService for RecordingPermissions {
    fn grant(&self, subject: Uuid, node: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .expect("calls")
            .push(("grant".into(), subject, node.into()));
        Ok(())
    }

    fn revoke(&self, subject: Uuid, node: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .expect("calls")
            .push(("revoke".into(), subject, node.into()));
        Ok(())
    }
}

#[derive(Default)]
pub struct Outbox {
    pub lines: Mutex<Vec<(Uuid, String)>>,
}

impl Outbox {
    pub fn for_player(&self, player: Uuid) -> Vec<String> {
        self.lines
            .lock()
            .expect("lines")
            .iter()
            .filter(|(who, _)| *who == player)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl ChatDelivery for Outbox {
    fn deliver(&self, recipient: Uuid, message: &str) {
        self.lines
            .lock()
            .expect("lines")
            .push((recipient, message.to_string()));
    }
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub store: Arc<SledGuildStore>,
    pub permissions: Arc<RecordingPermissions>,
    pub outbox: Arc<Outbox>,
    pub registry: GuildRegistry,
}

impl Fixture {
    /// Registry with default catalogs and settings.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_catalogs(config, DEFAULT_ROLES_TOML, DEFAULT_TIERS_TOML)
    }

    pub fn with_catalogs(config: Config, roles: &str, tiers: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(SledGuildStore::open(dir.path().join("guilds")).expect("store"));
        let fixture_store = Arc::clone(&store);
        Self::assemble(dir, fixture_store, config, roles, tiers)
    }

    fn assemble(
        dir: tempfile::TempDir,
        store: Arc<SledGuildStore>,
        config: Config,
        roles: &str,
        tiers: &str,
    ) -> Self {
        let permissions = Arc::new(RecordingPermissions::default());
        let outbox = Arc::new(Outbox::default());
        let registry = GuildRegistry::new(
            &config,
            RoleCatalog::from_toml_str(roles).expect("roles"),
            TierCatalog::from_toml_str(tiers).expect("tiers"),
            store.clone(),
            PermissionPropagator::synchronous(permissions.clone()),
            outbox.clone(),
        )
        .expect("registry");
        Self {
            dir,
            store,
            permissions,
            outbox,
            registry,
        }
    }

    /// A second registry over the same store, as after a restart, with
    /// possibly different catalogs.
    pub fn restart_with(self, roles: &str, tiers: &str) -> Self {
        let Fixture { dir, store, registry, .. } = self;
        drop(registry);
        Self::assemble(dir, store, Config::default(), roles, tiers)
    }

    pub fn restart(self) -> Self {
        self.restart_with(DEFAULT_ROLES_TOML, DEFAULT_TIERS_TOML)
    }

    /// Create a guild owned by a fresh player; returns (guild id, master id).
    pub fn guild(&mut self, name: &str) -> (Uuid, Uuid) {
        let master = Uuid::new_v4();
        let id = self
            .registry
            .create_guild(name, "TAG", master, &format!("{}Master", name))
            .expect("create guild");
        (id, master)
    }

    /// Add `count` fresh members to a guild, returning their ids.
    pub fn add_members(&mut self, guild_id: Uuid, count: usize) -> Vec<Uuid> {
        (0..count)
            .map(|n| {
                let player = Uuid::new_v4();
                self.registry
                    .join_guild(guild_id, player, &format!("Player{}", n))
                    .expect("join");
                player
            })
            .collect()
    }
}
