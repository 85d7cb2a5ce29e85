//! The guild registry: single owner of every live guild, the vault cache and
//! transient chat state.
//!
//! All reads and writes are expected from one owner thread. The only work
//! that leaves that thread is permission propagation in async mode and the
//! storage delete issued when a guild is removed.
//!
//! Lifecycle: build with [`GuildRegistry::new`], call
//! [`GuildRegistry::load_all`] at startup and [`GuildRegistry::save_all`] on
//! shutdown or on a save timer.

mod alliances;
mod membership;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::{ChatDelivery, ChatMode, ChatRouter, ChatSender, PlaceholderExpander};
use crate::config::{Config, GuildSettings, VaultSettings};
use crate::errors::{GuildError, PreconditionError};
use crate::guild::{Guild, GuildMember, RoleCatalog, RoleDefinition, TierCatalog, TierDefinition};
use crate::logutil::escape_log;
use crate::permissions::PermissionPropagator;
use crate::storage::GuildStore;
use crate::validation::{strip_colors, NameValidator};
use crate::vault::{Inventory, VaultCache};

/// What [`GuildRegistry::load_all`] had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub guilds: usize,
    pub tiers_repaired: usize,
    pub roles_repaired: usize,
    pub timestamps_backfilled: usize,
    pub unreadable_vaults: usize,
}

pub struct GuildRegistry {
    roles: RoleCatalog,
    tiers: TierCatalog,
    guilds: Vec<Guild>,
    vaults: VaultCache,
    store: Arc<dyn GuildStore>,
    permissions: PermissionPropagator,
    chat: ChatRouter,
    validator: NameValidator,
    guild_settings: GuildSettings,
    vault_settings: VaultSettings,
    /// Last known player names, for rendering ids that are not guild members.
    name_cache: HashMap<Uuid, String>,
}

impl GuildRegistry {
    pub fn new(
        config: &Config,
        roles: RoleCatalog,
        tiers: TierCatalog,
        store: Arc<dyn GuildStore>,
        permissions: PermissionPropagator,
        delivery: Arc<dyn ChatDelivery>,
    ) -> Result<Self, GuildError> {
        Ok(Self {
            roles,
            tiers,
            guilds: Vec::new(),
            vaults: VaultCache::new(),
            store,
            permissions,
            chat: ChatRouter::new(&config.guild, delivery),
            validator: NameValidator::from_settings(&config.guild)?,
            guild_settings: config.guild.clone(),
            vault_settings: config.vault.clone(),
            name_cache: HashMap::new(),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Replace the live collection with everything in storage, repairing
    /// dangling tier/role references and rebuilding the vault cache.
    pub fn load_all(&mut self) -> Result<LoadReport, GuildError> {
        let loaded = self.store.load_all_guilds()?;
        let mut report = LoadReport {
            guilds: loaded.len(),
            ..LoadReport::default()
        };

        self.vaults.clear();
        self.guilds.clear();
        for mut guild in loaded {
            self.reconcile(&mut guild, &mut report);
            report.unreadable_vaults += self.vaults.build(&guild);
            for member in &guild.members {
                self.name_cache
                    .insert(member.player_id, member.display_name.clone());
            }
            self.guilds.push(guild);
        }

        info!(
            "Loaded {} guilds ({} tier repairs, {} role repairs, {} unreadable vaults)",
            report.guilds, report.tiers_repaired, report.roles_repaired, report.unreadable_vaults
        );
        Ok(report)
    }

    fn reconcile(&self, guild: &mut Guild, report: &mut LoadReport) {
        if self.tiers.find_by_level(guild.tier_level).is_none() {
            let lowest = self.tiers.lowest().level;
            warn!(
                "The guild ({}) had tier level {} which no longer exists; set to the lowest tier level {}",
                escape_log(&guild.name), guild.tier_level, lowest
            );
            guild.tier_level = lowest;
            report.tiers_repaired += 1;
        }

        if guild.creation_timestamp == 0 {
            guild.creation_timestamp = Utc::now().timestamp_millis();
            report.timestamps_backfilled += 1;
        }

        for member in guild.members.iter_mut() {
            if self.roles.find_by_level(member.role_level).is_none() {
                let lowest = self.roles.lowest().level;
                warn!(
                    "The player ({}) in guild ({}) had role level {} which no longer exists; set to the lowest role level {}",
                    escape_log(&member.display_name),
                    escape_log(&guild.name),
                    member.role_level,
                    lowest
                );
                member.role_level = lowest;
                report.roles_repaired += 1;
            }
        }
    }

    /// Flatten every vault cache entry back into its guild, then hand the whole
    /// collection to storage in one batch.
    pub fn save_all(&mut self) -> Result<(), GuildError> {
        for guild in self.guilds.iter_mut() {
            if let Err(e) = self.vaults.flatten_into(guild) {
                error!("Vaults of guild {} ({}) not fully saved: {}", guild.name, guild.id, e);
            }
        }
        self.store.save_all_guilds(&self.guilds)?;
        debug!("Saved {} guilds", self.guilds.len());
        Ok(())
    }

    /// Insert a guild into the live collection (replacing one with the same id)
    /// and build its vault cache entry.
    pub fn add_guild(&mut self, guild: Guild) {
        self.vaults.build(&guild);
        for member in &guild.members {
            self.name_cache
                .insert(member.player_id, member.display_name.clone());
        }
        match self.index_of(guild.id) {
            Some(idx) => self.guilds[idx] = guild,
            None => self.guilds.push(guild),
        }
    }

    /// Evict a guild from the live collection, every other guild's ally lists
    /// and the vault cache, then delete it from storage. A failed delete is
    /// logged, never returned.
    pub fn remove_guild(&mut self, guild_id: Uuid) -> Option<Guild> {
        self.vaults.remove(guild_id);
        let idx = self.index_of(guild_id)?;
        self.remove_allies_on_delete(guild_id);
        let removed = self.guilds.remove(idx);
        self.delete_from_store(guild_id);
        Some(removed)
    }

    fn delete_from_store(&self, guild_id: Uuid) {
        let store = Arc::clone(&self.store);
        let key = guild_id.to_string();
        let run = move || {
            if let Err(e) = store.delete_guild(&key) {
                warn!("There was an error deleting a guild with the following uuid: {} ({})", key, e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(run);
            }
            Err(_) => run(),
        }
    }

    /// Disband a guild: revoke tier and role nodes from its members, then
    /// remove it (ally lists, vaults and storage included).
    pub fn disband(&mut self, guild_id: Uuid) -> Result<Guild, GuildError> {
        if self.index_of(guild_id).is_none() {
            return Err(GuildError::NotFound(format!("guild: {}", guild_id)));
        }
        self.revoke_tier_from_all(guild_id);
        self.revoke_role_from_all(guild_id);
        let removed = self
            .remove_guild(guild_id)
            .ok_or_else(|| GuildError::Internal(format!("guild {} vanished mid-disband", guild_id)))?;
        info!("Guild {} ({}) disbanded", removed.name, removed.id);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn index_of(&self, guild_id: Uuid) -> Option<usize> {
        self.guilds.iter().position(|g| g.id == guild_id)
    }

    pub(crate) fn guild_mut(&mut self, guild_id: Uuid) -> Result<&mut Guild, GuildError> {
        self.guilds
            .iter_mut()
            .find(|g| g.id == guild_id)
            .ok_or_else(|| GuildError::NotFound(format!("guild: {}", guild_id)))
    }

    pub(crate) fn require(&self, guild_id: Uuid) -> Result<&Guild, GuildError> {
        self.guild(guild_id)
            .ok_or_else(|| GuildError::NotFound(format!("guild: {}", guild_id)))
    }

    pub fn guild(&self, guild_id: Uuid) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.id == guild_id)
    }

    /// Exact, case-sensitive match against the color-stripped guild name.
    pub fn guild_by_name(&self, name: &str) -> Option<&Guild> {
        self.guilds.iter().find(|g| strip_colors(&g.name) == name)
    }

    pub fn guild_by_player(&self, player: Uuid) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.is_member(player))
    }

    pub fn guild_by_code(&self, code: &str) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.has_invite_code(code))
    }

    pub fn guild_member(&self, player: Uuid) -> Option<&GuildMember> {
        self.guild_by_player(player).and_then(|g| g.get_member(player))
    }

    pub fn name_by_id(&self, guild_id: Uuid) -> Option<String> {
        self.guild(guild_id).map(|g| strip_colors(&g.name))
    }

    pub fn guilds(&self) -> impl Iterator<Item = &Guild> {
        self.guilds.iter()
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    /// Color-stripped names of every guild.
    pub fn guild_names(&self) -> Vec<String> {
        self.guilds.iter().map(|g| strip_colors(&g.name)).collect()
    }

    /// True when a guild whose color-stripped name equals `name` (ignoring case) exists.
    pub fn check_guild_names(&self, name: &str) -> bool {
        self.name_in_use(name, None)
    }

    /// Same folding as `check_guild_names`, skipping the guild `except`.
    pub(crate) fn name_in_use(&self, name: &str, except: Option<Uuid>) -> bool {
        let wanted = strip_colors(name).to_lowercase();
        self.guilds
            .iter()
            .filter(|g| Some(g.id) != except)
            .any(|g| strip_colors(&g.name).to_lowercase() == wanted)
    }

    pub fn is_same_guild(&self, player: Uuid, other: Uuid) -> bool {
        match (self.guild_by_player(player), self.guild_by_player(other)) {
            (Some(a), Some(b)) => a.id == b.id,
            _ => false,
        }
    }

    pub fn cache_player_name(&mut self, player: Uuid, name: &str) {
        self.name_cache.insert(player, name.to_string());
    }

    pub fn cached_player_name(&self, player: Uuid) -> Option<&str> {
        self.name_cache.get(&player).map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Catalogs and gating
    // ------------------------------------------------------------------

    pub fn roles(&self) -> &RoleCatalog {
        &self.roles
    }

    pub fn tiers(&self) -> &TierCatalog {
        &self.tiers
    }

    /// Tier for `level`, or the lowest tier when the level is unmapped.
    pub fn guild_tier(&self, level: i32) -> &TierDefinition {
        self.tiers.get_or_lowest(level)
    }

    /// Role for `level`, or the lowest role when the level is unmapped.
    pub fn guild_role(&self, level: i32) -> &RoleDefinition {
        self.roles.get_or_lowest(level)
    }

    pub fn tier_of(&self, guild: &Guild) -> &TierDefinition {
        self.guild_tier(guild.tier_level)
    }

    pub fn role_of(&self, member: &GuildMember) -> &RoleDefinition {
        self.guild_role(member.role_level)
    }

    pub fn max_tier_level(&self) -> i32 {
        self.tiers.max_level()
    }

    pub fn is_max_tier(&self, guild: &Guild) -> bool {
        guild.tier_level >= self.max_tier_level()
    }

    pub fn check_if_full(&self, guild: &Guild) -> bool {
        guild.size() >= self.tier_of(guild).max_members as usize
    }

    /// Returns **true while the guild is still blocked** from ranking up: the
    /// tier requires a member count and the guild has fewer members than that.
    pub fn member_check(&self, guild: &Guild) -> bool {
        let required = self.tier_of(guild).members_required_to_rank_up;
        required != 0 && guild.size() < required as usize
    }

    /// Move a guild to the next tier, paying the current tier's upgrade cost
    /// from the guild bank and swapping tier permission nodes on every member.
    pub fn upgrade_tier(&mut self, guild_id: Uuid) -> Result<i32, GuildError> {
        let guild = self.require(guild_id)?;
        if self.is_max_tier(guild) {
            return Err(PreconditionError::MaxTier.into());
        }
        if self.member_check(guild) {
            return Err(PreconditionError::NotEnoughMembers {
                required: self.tier_of(guild).members_required_to_rank_up,
            }
            .into());
        }
        let current = self.tier_of(guild);
        let cost = current.upgrade_cost;
        if !guild.balance.is_finite() || !cost.is_finite() || guild.balance < cost {
            return Err(PreconditionError::InsufficientFunds.into());
        }
        let Some(next) = self.tiers.next_after(current.level) else {
            return Err(PreconditionError::MaxTier.into());
        };
        let next_level = next.level;

        self.revoke_tier_from_all(guild_id);
        let guild = self.guild_mut(guild_id)?;
        guild.balance -= cost;
        guild.tier_level = next_level;
        self.grant_tier_to_all(guild_id);
        info!("Guild {} upgraded to tier {}", guild_id, next_level);
        Ok(next_level)
    }

    // ------------------------------------------------------------------
    // Vaults
    // ------------------------------------------------------------------

    /// Rebuild the vault cache entry of one guild from its serialized vaults.
    pub fn create_vault_cache(&mut self, guild_id: Uuid) -> Result<usize, GuildError> {
        let idx = self
            .index_of(guild_id)
            .ok_or_else(|| GuildError::NotFound(format!("guild: {}", guild_id)))?;
        Ok(self.vaults.build(&self.guilds[idx]))
    }

    pub fn has_vault_unlocked(&self, slot: usize, guild: &Guild) -> bool {
        slot <= self.tier_of(guild).vault_slot_count as usize
    }

    fn ensure_unlocked(&self, guild: &Guild, slot: usize) -> Result<(), PreconditionError> {
        if slot == 0 || !self.has_vault_unlocked(slot, guild) {
            return Err(PreconditionError::VaultLocked {
                slot,
                unlocked: self.tier_of(guild).vault_slot_count as usize,
            });
        }
        Ok(())
    }

    /// 1-indexed vault of an existing slot.
    pub fn get_vault(&self, guild_id: Uuid, slot: usize) -> Result<&Inventory, GuildError> {
        let guild = self.require(guild_id)?;
        self.ensure_unlocked(guild, slot)?;
        Ok(self.vaults.get(guild_id, slot)?)
    }

    /// Fresh empty vault shaped by the vault settings.
    pub fn new_vault(&self) -> Inventory {
        Inventory::new(&self.vault_settings.vault_name, self.vault_settings.vault_size)
    }

    /// Open a vault for editing, creating empty vaults up to `slot` if the guild
    /// has not used them yet.
    pub fn open_vault(&mut self, guild_id: Uuid, slot: usize) -> Result<&mut Inventory, GuildError> {
        let guild = self.require(guild_id)?;
        self.ensure_unlocked(guild, slot)?;
        if !self.vaults.contains(guild_id) {
            self.create_vault_cache(guild_id)?;
        }

        while self.vaults.len_for(guild_id) < slot {
            let vault = self.new_vault();
            let payload = crate::vault::serialize_inventory(&vault)?;
            self.vaults.push(guild_id, vault);
            self.guild_mut(guild_id)?
                .vaults_serialized
                .get_or_insert_with(Vec::new)
                .push(payload);
        }
        Ok(self.vaults.get_mut(guild_id, slot)?)
    }

    pub fn vault_cache_len(&self, guild_id: Uuid) -> usize {
        self.vaults.len_for(guild_id)
    }

    // ------------------------------------------------------------------
    // Name rules
    // ------------------------------------------------------------------

    pub fn name_check(&self, name: &str) -> bool {
        self.validator.name_check(name)
    }

    pub fn prefix_check(&self, prefix: &str) -> bool {
        self.validator.prefix_check(prefix)
    }

    pub fn blacklist_check(&self, name: &str) -> bool {
        self.validator.blacklist_check(name)
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    pub fn set_placeholder_expander(&mut self, expander: Option<Arc<dyn PlaceholderExpander>>) {
        self.chat.set_expander(expander);
    }

    pub fn has_placeholder_expander(&self) -> bool {
        self.chat.has_expander()
    }

    pub fn toggle_spy(&mut self, player: Uuid) -> bool {
        self.chat.toggle_spy(player)
    }

    pub fn is_spy(&self, player: Uuid) -> bool {
        self.chat.is_spy(player)
    }

    pub fn set_chat_mode(&mut self, player: Uuid, mode: Option<ChatMode>) {
        self.chat.set_mode(player, mode);
    }

    pub fn chat_mode(&self, player: Uuid) -> Option<ChatMode> {
        self.chat.mode(player)
    }

    /// Drop spy status and chat mode of a disconnecting player.
    pub fn chat_logout(&mut self, player: Uuid) {
        self.chat.logout(player);
    }

    /// Clear every spy and chat mode (chat system reload).
    pub fn reset_chat(&mut self) {
        self.chat.reset();
    }

    fn sender_context(&self, sender: &ChatSender) -> Result<(&Guild, &RoleDefinition), GuildError> {
        let guild = self
            .guild_by_player(sender.id)
            .ok_or(PreconditionError::NotInGuild)?;
        let member = guild
            .get_member(sender.id)
            .ok_or(PreconditionError::NotInGuild)?;
        Ok((guild, self.role_of(member)))
    }

    pub fn route_guild_chat(&self, sender: &ChatSender, message: &str) -> Result<(), GuildError> {
        let (guild, role) = self.sender_context(sender)?;
        self.chat.route_guild_chat(guild, role, sender, message);
        Ok(())
    }

    pub fn route_ally_chat(&self, sender: &ChatSender, message: &str) -> Result<(), GuildError> {
        let (guild, role) = self.sender_context(sender)?;
        let allies: Vec<&Guild> = guild
            .allies()
            .iter()
            .filter_map(|id| {
                let ally = self.guild(*id);
                if ally.is_none() {
                    warn!("Guild {} lists unknown ally {}", guild.id, id);
                }
                ally
            })
            .collect();
        self.chat
            .route_ally_chat(guild, &allies, role, sender, message);
        Ok(())
    }

    /// Bracketed guild tag for `player`, or the configured no-guild text.
    pub fn formatted_placeholder(&self, player: Uuid) -> String {
        let s = &self.guild_settings;
        match self.guild_by_player(player) {
            None => s.format_no_guild.clone(),
            Some(guild) => {
                let combined = format!(
                    "{}{}{}",
                    s.format_bracket_left, s.format_content, s.format_bracket_right
                );
                crate::validation::colorize(
                    &combined
                        .replace("{name}", &guild.name)
                        .replace("{prefix}", &guild.prefix),
                )
            }
        }
    }
}
