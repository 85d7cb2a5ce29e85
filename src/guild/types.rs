use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PreconditionError;

pub const GUILD_SCHEMA_VERSION: u8 = 1;

/// One player's membership. The role is held by level and resolved through the
/// role catalog, so a catalog reload never leaves stale copies behind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildMember {
    pub player_id: Uuid,
    pub role_level: i32,
    pub display_name: String,
}

impl GuildMember {
    pub fn new(player_id: Uuid, role_level: i32, display_name: &str) -> Self {
        Self {
            player_id,
            role_level,
            display_name: display_name.to_string(),
        }
    }
}

/// Limited-use invite token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildCode {
    pub id: String,
    pub creator: Uuid,
    pub remaining_uses: u32,
    pub redeemers: HashSet<Uuid>,
}

impl GuildCode {
    pub fn new(id: &str, creator: Uuid, uses: u32) -> Self {
        Self {
            id: id.to_string(),
            creator,
            remaining_uses: uses,
            redeemers: HashSet::new(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_uses == 0
    }

    /// Consume one use for `player`. Nothing changes when the code is refused.
    pub fn redeem(&mut self, player: Uuid) -> Result<(), PreconditionError> {
        if self.is_exhausted() {
            return Err(PreconditionError::CodeExhausted(self.id.clone()));
        }
        if self.redeemers.contains(&player) {
            return Err(PreconditionError::CodeAlreadyRedeemed(self.id.clone()));
        }
        self.redeemers.insert(player);
        self.remaining_uses -= 1;
        Ok(())
    }
}

/// Persistent guild aggregate.
///
/// Ally and pending-ally sets are only mutated by the registry, which keeps
/// them symmetric across both guilds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guild {
    pub schema_version: u8,
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    /// Epoch millis. Zero means unknown; backfilled on load.
    pub creation_timestamp: i64,
    pub tier_level: i32,
    pub members: Vec<GuildMember>,
    pub invited_players: HashSet<Uuid>,
    allies: HashSet<Uuid>,
    pending_allies: HashSet<Uuid>,
    pub invite_codes: Vec<GuildCode>,
    /// `None` until the guild first opens a vault.
    pub vaults_serialized: Option<Vec<String>>,
    pub is_private: bool,
    pub balance: f64,
    pub motd: Option<String>,
}

impl Guild {
    /// Found a new guild with `master` as its only member.
    pub fn new(name: &str, prefix: &str, master: GuildMember, tier_level: i32) -> Self {
        Self::with_id(Uuid::new_v4(), name, prefix, master, tier_level)
    }

    pub fn with_id(
        id: Uuid,
        name: &str,
        prefix: &str,
        master: GuildMember,
        tier_level: i32,
    ) -> Self {
        Self {
            schema_version: GUILD_SCHEMA_VERSION,
            id,
            name: name.to_string(),
            prefix: prefix.to_string(),
            creation_timestamp: Utc::now().timestamp_millis(),
            tier_level,
            members: vec![master],
            invited_players: HashSet::new(),
            allies: HashSet::new(),
            pending_allies: HashSet::new(),
            invite_codes: Vec::new(),
            vaults_serialized: None,
            is_private: false,
            balance: 0.0,
            motd: None,
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn get_member(&self, player: Uuid) -> Option<&GuildMember> {
        self.members.iter().find(|m| m.player_id == player)
    }

    pub fn get_member_mut(&mut self, player: Uuid) -> Option<&mut GuildMember> {
        self.members.iter_mut().find(|m| m.player_id == player)
    }

    pub fn is_member(&self, player: Uuid) -> bool {
        self.get_member(player).is_some()
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.player_id).collect()
    }

    /// Adds `member` unless the player is already present. Clears any pending invite.
    pub fn add_member(&mut self, member: GuildMember) -> bool {
        if self.is_member(member.player_id) {
            return false;
        }
        self.invited_players.remove(&member.player_id);
        self.members.push(member);
        true
    }

    pub fn remove_member(&mut self, player: Uuid) -> Option<GuildMember> {
        let idx = self.members.iter().position(|m| m.player_id == player)?;
        Some(self.members.remove(idx))
    }

    pub fn invite(&mut self, player: Uuid) -> bool {
        self.invited_players.insert(player)
    }

    pub fn is_invited(&self, player: Uuid) -> bool {
        self.invited_players.contains(&player)
    }

    pub fn has_invite_code(&self, code: &str) -> bool {
        self.invite_codes.iter().any(|c| c.id == code)
    }

    pub fn code(&self, code: &str) -> Option<&GuildCode> {
        self.invite_codes.iter().find(|c| c.id == code)
    }

    pub fn code_mut(&mut self, code: &str) -> Option<&mut GuildCode> {
        self.invite_codes.iter_mut().find(|c| c.id == code)
    }

    pub fn remove_code(&mut self, code: &str) -> Option<GuildCode> {
        let idx = self.invite_codes.iter().position(|c| c.id == code)?;
        Some(self.invite_codes.remove(idx))
    }

    pub fn allies(&self) -> &HashSet<Uuid> {
        &self.allies
    }

    pub fn pending_allies(&self) -> &HashSet<Uuid> {
        &self.pending_allies
    }

    pub fn is_ally(&self, other: Uuid) -> bool {
        self.allies.contains(&other)
    }

    pub(crate) fn allies_mut(&mut self) -> &mut HashSet<Uuid> {
        &mut self.allies
    }

    pub(crate) fn pending_allies_mut(&mut self) -> &mut HashSet<Uuid> {
        &mut self.pending_allies
    }

    /// Number of serialized vault slots (zero when no vault was ever opened).
    pub fn vault_count(&self) -> usize {
        self.vaults_serialized.as_ref().map_or(0, Vec::len)
    }
}
