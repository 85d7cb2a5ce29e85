//! Membership roles and the role catalog.
//!
//! Roles are loaded once from `roles.toml`, keyed by level:
//!
//! ```toml
//! [roles.0]
//! name = "GuildMaster"
//! permission-node = "guilds.role.gm"
//! [roles.0.permissions]
//! invite = true
//! kick = true
//! ```
//!
//! Lower levels outrank higher ones, so level 0 is the guild master and the
//! highest level present is the default role handed to new members.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::GuildError;

/// Capabilities a role may grant inside its guild.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GuildRolePerm {
    ActivateClaim,
    Unclaim,
    Invite,
    Kick,
    Promote,
    Demote,
    AddAlly,
    RemoveAlly,
    ChangePrefix,
    ChangeName,
    ChangeHome,
    RemoveHome,
    Chat,
    AllyChat,
    DepositMoney,
    WithdrawMoney,
    UpgradeGuild,
    TransferGuild,
    DeleteGuild,
    ToggleGuild,
    OpenVault,
    CreateCode,
    DeleteCode,
    SeeCodeRedeemers,
    ModifyMotd,
}

impl GuildRolePerm {
    pub const ALL: [GuildRolePerm; 25] = [
        GuildRolePerm::ActivateClaim,
        GuildRolePerm::Unclaim,
        GuildRolePerm::Invite,
        GuildRolePerm::Kick,
        GuildRolePerm::Promote,
        GuildRolePerm::Demote,
        GuildRolePerm::AddAlly,
        GuildRolePerm::RemoveAlly,
        GuildRolePerm::ChangePrefix,
        GuildRolePerm::ChangeName,
        GuildRolePerm::ChangeHome,
        GuildRolePerm::RemoveHome,
        GuildRolePerm::Chat,
        GuildRolePerm::AllyChat,
        GuildRolePerm::DepositMoney,
        GuildRolePerm::WithdrawMoney,
        GuildRolePerm::UpgradeGuild,
        GuildRolePerm::TransferGuild,
        GuildRolePerm::DeleteGuild,
        GuildRolePerm::ToggleGuild,
        GuildRolePerm::OpenVault,
        GuildRolePerm::CreateCode,
        GuildRolePerm::DeleteCode,
        GuildRolePerm::SeeCodeRedeemers,
        GuildRolePerm::ModifyMotd,
    ];

    /// Key used under `[roles.<level>.permissions]`.
    pub fn config_key(&self) -> &'static str {
        match self {
            GuildRolePerm::ActivateClaim => "activate-claim",
            GuildRolePerm::Unclaim => "unclaim",
            GuildRolePerm::Invite => "invite",
            GuildRolePerm::Kick => "kick",
            GuildRolePerm::Promote => "promote",
            GuildRolePerm::Demote => "demote",
            GuildRolePerm::AddAlly => "add-ally",
            GuildRolePerm::RemoveAlly => "remove-ally",
            GuildRolePerm::ChangePrefix => "change-prefix",
            GuildRolePerm::ChangeName => "change-name",
            GuildRolePerm::ChangeHome => "change-home",
            GuildRolePerm::RemoveHome => "remove-home",
            GuildRolePerm::Chat => "chat",
            GuildRolePerm::AllyChat => "ally-chat",
            GuildRolePerm::DepositMoney => "deposit-money",
            GuildRolePerm::WithdrawMoney => "withdraw-money",
            GuildRolePerm::UpgradeGuild => "upgrade-guild",
            GuildRolePerm::TransferGuild => "transfer-guild",
            GuildRolePerm::DeleteGuild => "delete-guild",
            GuildRolePerm::ToggleGuild => "toggle-guild",
            GuildRolePerm::OpenVault => "open-vault",
            GuildRolePerm::CreateCode => "create-code",
            GuildRolePerm::DeleteCode => "delete-code",
            GuildRolePerm::SeeCodeRedeemers => "see-code-redeemers",
            GuildRolePerm::ModifyMotd => "modify-motd",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.config_key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub level: i32,
    pub name: String,
    /// External permission node granted to holders of this role. May be empty.
    pub permission_node: String,
    pub perms: HashSet<GuildRolePerm>,
}

impl RoleDefinition {
    pub fn new(level: i32, name: &str, permission_node: &str) -> Self {
        Self {
            level,
            name: name.to_string(),
            permission_node: permission_node.to_string(),
            perms: HashSet::new(),
        }
    }

    pub fn with_perm(mut self, perm: GuildRolePerm) -> Self {
        self.perms.insert(perm);
        self
    }

    pub fn has_perm(&self, perm: GuildRolePerm) -> bool {
        self.perms.contains(&perm)
    }
}

#[derive(Debug, Deserialize)]
struct RoleSeed {
    name: String,
    #[serde(rename = "permission-node", default)]
    permission_node: String,
    #[serde(default)]
    permissions: HashMap<String, bool>,
}

/// Ordered, immutable set of roles. Never empty.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    /// Sorted by ascending level (highest rank first).
    roles: Vec<RoleDefinition>,
}

impl RoleCatalog {
    /// Build a catalog, dropping duplicate levels (first one wins).
    pub fn from_definitions(definitions: Vec<RoleDefinition>) -> Result<Self, GuildError> {
        let mut roles: Vec<RoleDefinition> = Vec::with_capacity(definitions.len());
        for def in definitions {
            if roles.iter().any(|r| r.level == def.level) {
                warn!(
                    "Duplicate role level {} ({}) ignored; keeping the first definition",
                    def.level, def.name
                );
                continue;
            }
            roles.push(def);
        }
        if roles.is_empty() {
            return Err(GuildError::EmptyCatalog("role"));
        }
        roles.sort_by_key(|r| r.level);
        Ok(Self { roles })
    }

    /// Parse a `roles.toml` document. Malformed entries are skipped with a warning.
    pub fn from_toml_str(content: &str) -> Result<Self, GuildError> {
        let doc: toml::Table = toml::from_str(content)
            .map_err(|e| GuildError::ConfigParse(format!("roles: {}", e)))?;
        let Some(section) = doc.get("roles").and_then(|v| v.as_table()) else {
            return Err(GuildError::ConfigParse("roles: missing [roles] table".into()));
        };

        let mut definitions = Vec::new();
        for (key, value) in section {
            let Ok(level) = key.trim().parse::<i32>() else {
                warn!("Skipping role '{}': key is not a numeric level", key);
                continue;
            };
            let seed: RoleSeed = match value.clone().try_into() {
                Ok(seed) => seed,
                Err(e) => {
                    warn!("Skipping role level {}: {}", level, e);
                    continue;
                }
            };
            let mut role = RoleDefinition::new(level, &seed.name, &seed.permission_node);
            for (perm_key, enabled) in seed.permissions {
                match GuildRolePerm::from_config_key(&perm_key) {
                    Some(perm) if enabled => {
                        role.perms.insert(perm);
                    }
                    Some(_) => {}
                    None => warn!("Role {} lists unknown permission '{}'", level, perm_key),
                }
            }
            definitions.push(role);
        }
        Self::from_definitions(definitions)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GuildError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn find_by_level(&self, level: i32) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.level == level)
    }

    /// The default role: highest numeric level present.
    pub fn lowest(&self) -> &RoleDefinition {
        &self.roles[self.roles.len() - 1]
    }

    /// The guild master role: lowest numeric level present.
    pub fn highest(&self) -> &RoleDefinition {
        &self.roles[0]
    }

    /// Resolve a level, falling back to [`RoleCatalog::lowest`] when unmapped.
    pub fn get_or_lowest(&self, level: i32) -> &RoleDefinition {
        self.find_by_level(level).unwrap_or_else(|| self.lowest())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.iter()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Default `roles.toml` written by `guildhall init`.
pub const DEFAULT_ROLES_TOML: &str = r#"[roles.0]
name = "GuildMaster"
permission-node = "guilds.role.gm"
[roles.0.permissions]
activate-claim = true
unclaim = true
invite = true
kick = true
promote = true
demote = true
add-ally = true
remove-ally = true
change-prefix = true
change-name = true
change-home = true
remove-home = true
chat = true
ally-chat = true
deposit-money = true
withdraw-money = true
upgrade-guild = true
transfer-guild = true
delete-guild = true
toggle-guild = true
open-vault = true
create-code = true
delete-code = true
see-code-redeemers = true
modify-motd = true

[roles.1]
name = "Officer"
permission-node = "guilds.role.officer"
[roles.1.permissions]
invite = true
kick = true
promote = true
demote = true
chat = true
ally-chat = true
deposit-money = true
withdraw-money = true
open-vault = true
create-code = true

[roles.2]
name = "Veteran"
permission-node = "guilds.role.veteran"
[roles.2.permissions]
invite = true
chat = true
ally-chat = true
deposit-money = true
open-vault = true

[roles.3]
name = "Member"
permission-node = "guilds.role.member"
[roles.3.permissions]
chat = true
ally-chat = true
deposit-money = true
"#;
