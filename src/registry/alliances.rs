//! Symmetric alliance and pending-alliance bookkeeping.

use log::{debug, warn};
use uuid::Uuid;

use super::GuildRegistry;
use crate::errors::{GuildError, PreconditionError};

impl GuildRegistry {
    /// Indices of two distinct live guilds, or the error that stops the change
    /// before anything is touched.
    fn pair(&self, a: Uuid, b: Uuid) -> Result<(usize, usize), GuildError> {
        if a == b {
            return Err(PreconditionError::SameGuild.into());
        }
        let ia = self
            .index_of(a)
            .ok_or_else(|| GuildError::NotFound(format!("guild: {}", a)))?;
        let ib = self
            .index_of(b)
            .ok_or_else(|| GuildError::NotFound(format!("guild: {}", b)))?;
        Ok((ia, ib))
    }

    /// Make two guilds allies, clearing any pending request between them.
    pub fn add_ally(&mut self, a: Uuid, b: Uuid) -> Result<(), GuildError> {
        let (ia, ib) = self.pair(a, b)?;
        for idx in [ia, ib] {
            let guild = &self.guilds[idx];
            let limit = self.tier_of(guild).max_allies;
            let other = if idx == ia { b } else { a };
            if !guild.is_ally(other) && guild.allies().len() >= limit as usize {
                return Err(PreconditionError::AllyLimit(limit).into());
            }
        }

        let ga = &mut self.guilds[ia];
        ga.allies_mut().insert(b);
        ga.pending_allies_mut().remove(&b);
        let gb = &mut self.guilds[ib];
        gb.allies_mut().insert(a);
        gb.pending_allies_mut().remove(&a);
        debug!("Guilds {} and {} are now allied", a, b);
        Ok(())
    }

    pub fn remove_ally(&mut self, a: Uuid, b: Uuid) -> Result<(), GuildError> {
        let (ia, ib) = self.pair(a, b)?;
        self.guilds[ia].allies_mut().remove(&b);
        self.guilds[ib].allies_mut().remove(&a);
        Ok(())
    }

    /// Record an outstanding alliance request between two guilds.
    pub fn add_pending_ally(&mut self, a: Uuid, b: Uuid) -> Result<(), GuildError> {
        let (ia, ib) = self.pair(a, b)?;
        self.guilds[ia].pending_allies_mut().insert(b);
        self.guilds[ib].pending_allies_mut().insert(a);
        Ok(())
    }

    pub fn remove_pending_ally(&mut self, a: Uuid, b: Uuid) -> Result<(), GuildError> {
        let (ia, ib) = self.pair(a, b)?;
        self.guilds[ia].pending_allies_mut().remove(&b);
        self.guilds[ib].pending_allies_mut().remove(&a);
        Ok(())
    }

    /// Purge `guild_id` from every other guild's ally and pending-ally sets.
    pub fn remove_allies_on_delete(&mut self, guild_id: Uuid) {
        let mut touched = 0;
        for guild in self.guilds.iter_mut().filter(|g| g.id != guild_id) {
            let was_ally = guild.allies_mut().remove(&guild_id);
            let was_pending = guild.pending_allies_mut().remove(&guild_id);
            if was_ally || was_pending {
                touched += 1;
            }
        }
        debug!("Removed guild {} from {} alliance lists", guild_id, touched);
    }

    /// True when the two guilds are allied.
    pub fn is_ally(&self, a: Uuid, b: Uuid) -> bool {
        self.guild(a).is_some_and(|g| g.is_ally(b))
    }

    /// True when the guilds of both players are allied.
    pub fn is_ally_player(&self, player: Uuid, other: Uuid) -> bool {
        match (self.guild_by_player(player), self.guild_by_player(other)) {
            (Some(a), Some(b)) => a.is_ally(b.id),
            _ => false,
        }
    }

    /// Send `message` to every member of every ally of `guild_id`.
    pub fn notify_allies(&self, guild_id: Uuid, message: &str) -> Result<usize, GuildError> {
        let guild = self.require(guild_id)?;
        let mut delivered = 0;
        for ally_id in guild.allies() {
            match self.guild(*ally_id) {
                Some(ally) => {
                    for member in &ally.members {
                        self.chat.deliver_to(member.player_id, message);
                        delivered += 1;
                    }
                }
                None => warn!("Guild {} lists unknown ally {}", guild_id, ally_id),
            }
        }
        Ok(delivered)
    }
}
