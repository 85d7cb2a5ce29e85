//! Membership, invites, invite codes, the guild bank and permission-node
//! propagation for members.

use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use super::GuildRegistry;
use crate::errors::{GuildError, PreconditionError};
use crate::guild::{Guild, GuildCode, GuildMember, GuildRolePerm};
use crate::validation::strip_colors;

const CODE_LENGTH: usize = 10;

fn random_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}

impl GuildRegistry {
    // ------------------------------------------------------------------
    // Permission nodes
    // ------------------------------------------------------------------

    fn tier_nodes(&self, guild_id: Uuid) -> Option<(Vec<Uuid>, Vec<String>)> {
        let guild = self.guild(guild_id)?;
        let nodes = self.tier_of(guild).granted_permissions.clone();
        Some((guild.member_ids(), nodes))
    }

    pub fn grant_tier_to(&self, guild_id: Uuid, player: Uuid) {
        if let Some((_, nodes)) = self.tier_nodes(guild_id) {
            self.permissions.grant(player, &nodes);
        }
    }

    pub fn revoke_tier_from(&self, guild_id: Uuid, player: Uuid) {
        if let Some((_, nodes)) = self.tier_nodes(guild_id) {
            self.permissions.revoke(player, &nodes);
        }
    }

    /// Grant the guild's tier nodes to every member.
    pub fn grant_tier_to_all(&self, guild_id: Uuid) {
        if let Some((members, nodes)) = self.tier_nodes(guild_id) {
            self.permissions.grant_to_all(&members, &nodes);
        }
    }

    pub fn revoke_tier_from_all(&self, guild_id: Uuid) {
        if let Some((members, nodes)) = self.tier_nodes(guild_id) {
            self.permissions.revoke_from_all(&members, &nodes);
        }
    }

    fn role_node(&self, player: Uuid) -> Option<Vec<String>> {
        let member = self.guild_member(player)?;
        Some(vec![self.role_of(member).permission_node.clone()])
    }

    pub fn grant_role_to(&self, player: Uuid) {
        if let Some(node) = self.role_node(player) {
            self.permissions.grant(player, &node);
        }
    }

    pub fn revoke_role_from(&self, player: Uuid) {
        if let Some(node) = self.role_node(player) {
            self.permissions.revoke(player, &node);
        }
    }

    /// Revoke each member's own role node.
    pub fn revoke_role_from_all(&self, guild_id: Uuid) {
        let Some(guild) = self.guild(guild_id) else {
            return;
        };
        for member in &guild.members {
            let node = vec![self.role_of(member).permission_node.clone()];
            self.permissions.revoke(member.player_id, &node);
        }
    }

    // ------------------------------------------------------------------
    // Creation and membership
    // ------------------------------------------------------------------

    /// Found a new guild at the lowest tier with `master` holding the top role.
    pub fn create_guild(
        &mut self,
        name: &str,
        prefix: &str,
        master: Uuid,
        master_name: &str,
    ) -> Result<Uuid, GuildError> {
        if self.guild_by_player(master).is_some() {
            return Err(PreconditionError::AlreadyInGuild.into());
        }
        if !self.name_check(name) || self.blacklist_check(name) {
            return Err(PreconditionError::InvalidName(name.to_string()).into());
        }
        if !self.prefix_check(prefix) {
            return Err(PreconditionError::InvalidPrefix(prefix.to_string()).into());
        }
        if self.check_guild_names(name) {
            return Err(PreconditionError::NameTaken(strip_colors(name)).into());
        }

        let member = GuildMember::new(master, self.roles.highest().level, master_name);
        let guild = Guild::new(name, prefix, member, self.tiers.lowest().level);
        let id = guild.id;
        self.add_guild(guild);
        self.grant_tier_to(id, master);
        self.grant_role_to(master);
        info!("Guild {} ({}) created by {}", name, id, master);
        Ok(id)
    }

    /// Add `player` with the default role. Private guilds require an invite.
    pub fn join_guild(
        &mut self,
        guild_id: Uuid,
        player: Uuid,
        display_name: &str,
    ) -> Result<(), GuildError> {
        if self.guild_by_player(player).is_some() {
            return Err(PreconditionError::AlreadyInGuild.into());
        }
        let guild = self.require(guild_id)?;
        if guild.is_private && !guild.is_invited(player) {
            return Err(PreconditionError::NotInvited.into());
        }
        if self.check_if_full(guild) {
            return Err(PreconditionError::GuildFull(self.tier_of(guild).max_members as usize).into());
        }
        self.admit(guild_id, player, display_name)
    }

    fn admit(&mut self, guild_id: Uuid, player: Uuid, display_name: &str) -> Result<(), GuildError> {
        let role_level = self.roles.lowest().level;
        self.guild_mut(guild_id)?
            .add_member(GuildMember::new(player, role_level, display_name));
        self.cache_player_name(player, display_name);
        self.grant_tier_to(guild_id, player);
        self.grant_role_to(player);
        debug!("{} joined guild {}", player, guild_id);
        Ok(())
    }

    /// Remove `player` from their guild, revoking tier and role nodes and
    /// dropping their chat mode. Handing over or disbanding a guild whose
    /// master leaves is up to the caller.
    pub fn leave_guild(&mut self, player: Uuid) -> Result<GuildMember, GuildError> {
        let guild_id = self
            .guild_by_player(player)
            .map(|g| g.id)
            .ok_or(PreconditionError::NotInGuild)?;
        self.revoke_tier_from(guild_id, player);
        self.revoke_role_from(player);
        let member = self
            .guild_mut(guild_id)?
            .remove_member(player)
            .ok_or(PreconditionError::NotInGuild)?;
        self.chat.set_mode(player, None);
        debug!("{} left guild {}", player, guild_id);
        Ok(member)
    }

    /// Promote or demote a member, swapping their role node.
    pub fn set_member_role(&mut self, player: Uuid, role_level: i32) -> Result<(), GuildError> {
        if self.roles.find_by_level(role_level).is_none() {
            return Err(PreconditionError::UnknownRole(role_level).into());
        }
        let guild_id = self
            .guild_by_player(player)
            .map(|g| g.id)
            .ok_or(PreconditionError::NotInGuild)?;
        self.revoke_role_from(player);
        if let Some(member) = self.guild_mut(guild_id)?.get_member_mut(player) {
            member.role_level = role_level;
        }
        self.grant_role_to(player);
        Ok(())
    }

    /// Hand the top role to `new_master`, demoting the current holder(s) to the
    /// next role down.
    pub fn transfer_guild(&mut self, guild_id: Uuid, new_master: Uuid) -> Result<(), GuildError> {
        let guild = self.require(guild_id)?;
        if !guild.is_member(new_master) {
            return Err(PreconditionError::NotInGuild.into());
        }
        let top = self.roles.highest().level;
        let second = self
            .roles
            .iter()
            .nth(1)
            .map_or(self.roles.lowest().level, |r| r.level);
        let previous: Vec<Uuid> = guild
            .members
            .iter()
            .filter(|m| m.role_level == top && m.player_id != new_master)
            .map(|m| m.player_id)
            .collect();
        for player in previous {
            self.set_member_role(player, second)?;
        }
        self.set_member_role(new_master, top)
    }

    pub fn invite_player(&mut self, guild_id: Uuid, player: Uuid) -> Result<bool, GuildError> {
        let guild = self.guild_mut(guild_id)?;
        if guild.is_member(player) {
            return Err(PreconditionError::AlreadyInGuild.into());
        }
        Ok(guild.invite(player))
    }

    pub fn revoke_invite(&mut self, guild_id: Uuid, player: Uuid) -> Result<bool, GuildError> {
        Ok(self.guild_mut(guild_id)?.invited_players.remove(&player))
    }

    /// Members whose role carries the invite capability.
    pub fn inviters(&self, guild: &Guild) -> Vec<Uuid> {
        guild
            .members
            .iter()
            .filter(|m| self.role_of(m).has_perm(GuildRolePerm::Invite))
            .map(|m| m.player_id)
            .collect()
    }

    /// Names of the guilds that invited `player`.
    pub fn invited_guilds(&self, player: Uuid) -> Vec<String> {
        self.guilds
            .iter()
            .filter(|g| g.is_invited(player))
            .map(|g| strip_colors(&g.name))
            .collect()
    }

    pub fn public_guilds(&self) -> Vec<String> {
        self.guilds
            .iter()
            .filter(|g| !g.is_private)
            .map(|g| strip_colors(&g.name))
            .collect()
    }

    /// Guilds that invited `player`, followed by every other public guild.
    pub fn joinable_guilds(&self, player: Uuid) -> Vec<String> {
        let invited = self.guilds.iter().filter(|g| g.is_invited(player));
        let public = self
            .guilds
            .iter()
            .filter(|g| !g.is_private && !g.is_invited(player));
        invited.chain(public).map(|g| strip_colors(&g.name)).collect()
    }

    // ------------------------------------------------------------------
    // Guild settings
    // ------------------------------------------------------------------

    pub fn rename_guild(&mut self, guild_id: Uuid, name: &str) -> Result<(), GuildError> {
        if !self.name_check(name) || self.blacklist_check(name) {
            return Err(PreconditionError::InvalidName(name.to_string()).into());
        }
        if self.name_in_use(name, Some(guild_id)) {
            return Err(PreconditionError::NameTaken(strip_colors(name)).into());
        }
        self.guild_mut(guild_id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_prefix(&mut self, guild_id: Uuid, prefix: &str) -> Result<(), GuildError> {
        if !self.prefix_check(prefix) {
            return Err(PreconditionError::InvalidPrefix(prefix.to_string()).into());
        }
        self.guild_mut(guild_id)?.prefix = prefix.to_string();
        Ok(())
    }

    pub fn set_motd(&mut self, guild_id: Uuid, motd: Option<&str>) -> Result<(), GuildError> {
        self.guild_mut(guild_id)?.motd = motd.map(str::to_string);
        Ok(())
    }

    /// Flip the private flag, returning the new value.
    pub fn toggle_private(&mut self, guild_id: Uuid) -> Result<bool, GuildError> {
        let guild = self.guild_mut(guild_id)?;
        guild.is_private = !guild.is_private;
        Ok(guild.is_private)
    }

    // ------------------------------------------------------------------
    // Invite codes
    // ------------------------------------------------------------------

    /// Create a code with `uses` redemptions, unique across all guilds.
    pub fn create_code(&mut self, guild_id: Uuid, creator: Uuid, uses: u32) -> Result<String, GuildError> {
        let mut code = random_code();
        while self.guild_by_code(&code).is_some() {
            code = random_code();
        }
        self.guild_mut(guild_id)?
            .invite_codes
            .push(GuildCode::new(&code, creator, uses));
        Ok(code)
    }

    pub fn delete_code(&mut self, guild_id: Uuid, code: &str) -> Result<GuildCode, GuildError> {
        self.guild_mut(guild_id)?
            .remove_code(code)
            .ok_or_else(|| GuildError::NotFound(format!("code: {}", code)))
    }

    /// Join through an invite code. Every check runs before the code or the
    /// guild is touched. Returns the joined guild's id.
    pub fn redeem_code(&mut self, code: &str, player: Uuid, display_name: &str) -> Result<Uuid, GuildError> {
        if self.guild_by_player(player).is_some() {
            return Err(PreconditionError::AlreadyInGuild.into());
        }
        let guild = self
            .guild_by_code(code)
            .ok_or_else(|| GuildError::NotFound(format!("code: {}", code)))?;
        let guild_id = guild.id;
        if let Some(existing) = guild.code(code) {
            if existing.is_exhausted() {
                return Err(PreconditionError::CodeExhausted(code.to_string()).into());
            }
            if existing.redeemers.contains(&player) {
                return Err(PreconditionError::CodeAlreadyRedeemed(code.to_string()).into());
            }
        }
        if self.check_if_full(guild) {
            return Err(PreconditionError::GuildFull(self.tier_of(guild).max_members as usize).into());
        }

        self.guild_mut(guild_id)?
            .code_mut(code)
            .ok_or_else(|| GuildError::NotFound(format!("code: {}", code)))?
            .redeem(player)?;
        self.admit(guild_id, player, display_name)?;
        Ok(guild_id)
    }

    fn player_label(&self, player: Uuid) -> String {
        self.cached_player_name(player)
            .map(str::to_string)
            .unwrap_or_else(|| player.to_string())
    }

    /// One line per code: id, uses left and creator name.
    pub fn code_listing(&self, guild_id: Uuid) -> Result<Vec<String>, GuildError> {
        let guild = self.require(guild_id)?;
        Ok(guild
            .invite_codes
            .iter()
            .map(|c| {
                format!(
                    "{} ({} uses left) by {}",
                    c.id,
                    c.remaining_uses,
                    self.player_label(c.creator)
                )
            })
            .collect())
    }

    pub fn code_redeemers(&self, guild_id: Uuid, code: &str) -> Result<Vec<String>, GuildError> {
        let guild = self.require(guild_id)?;
        let code = guild
            .code(code)
            .ok_or_else(|| GuildError::NotFound(format!("code: {}", code)))?;
        let mut names: Vec<String> = code.redeemers.iter().map(|p| self.player_label(*p)).collect();
        names.sort();
        Ok(names)
    }

    // ------------------------------------------------------------------
    // Bank
    // ------------------------------------------------------------------

    /// Add to the guild bank, refusing to exceed the tier's bank limit.
    /// Non-positive amounts leave the balance alone; NaN and infinities are
    /// refused.
    pub fn deposit(&mut self, guild_id: Uuid, amount: f64) -> Result<f64, GuildError> {
        if !amount.is_finite() {
            return Err(PreconditionError::InvalidAmount(amount).into());
        }
        let guild = self.require(guild_id)?;
        if amount <= 0.0 {
            return Ok(guild.balance);
        }
        let limit = self.tier_of(guild).max_bank_balance;
        if guild.balance + amount > limit {
            return Err(PreconditionError::BankLimit(limit).into());
        }
        let guild = self.guild_mut(guild_id)?;
        guild.balance += amount;
        Ok(guild.balance)
    }

    pub fn withdraw(&mut self, guild_id: Uuid, amount: f64) -> Result<f64, GuildError> {
        if !amount.is_finite() {
            return Err(PreconditionError::InvalidAmount(amount).into());
        }
        let guild = self.guild_mut(guild_id)?;
        if amount <= 0.0 {
            return Ok(guild.balance);
        }
        if guild.balance < amount {
            return Err(PreconditionError::InsufficientFunds.into());
        }
        guild.balance -= amount;
        Ok(guild.balance)
    }
}
