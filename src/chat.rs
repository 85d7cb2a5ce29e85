//! Guild, ally and spy chat routing.
//!
//! Templates accept `{role}`, `{player}`, `{display-name}`, `{message}` and
//! `{guild}`, substituted in that order, then `&` color codes are translated
//! and an optional placeholder expander gets the final say.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::config::GuildSettings;
use crate::guild::{Guild, RoleDefinition};
use crate::logutil::chat_log_line;
use crate::validation::colorize;

/// Delivers a formatted line to one connected player.
pub trait ChatDelivery: Send + Sync {
    fn deliver(&self, recipient: Uuid, message: &str);
}

/// Optional third-party placeholder expansion applied to every formatted line.
pub trait PlaceholderExpander: Send + Sync {
    fn expand(&self, player: Uuid, text: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct ChatSender {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
}

impl ChatSender {
    pub fn new(id: Uuid, name: &str, display_name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

/// Which channel a player's plain chat goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    Guild,
    Ally,
}

#[derive(Debug, Clone)]
struct ChatTemplates {
    guild: String,
    ally: String,
    spy: String,
    log_guild: bool,
    log_ally: bool,
}

pub struct ChatRouter {
    templates: ChatTemplates,
    delivery: Arc<dyn ChatDelivery>,
    expander: Option<Arc<dyn PlaceholderExpander>>,
    spies: HashSet<Uuid>,
    modes: HashMap<Uuid, ChatMode>,
}

impl ChatRouter {
    pub fn new(settings: &GuildSettings, delivery: Arc<dyn ChatDelivery>) -> Self {
        Self {
            templates: ChatTemplates {
                guild: settings.guild_chat_format.clone(),
                ally: settings.ally_chat_format.clone(),
                spy: settings.spy_chat_format.clone(),
                log_guild: settings.log_guild_chat,
                log_ally: settings.log_ally_chat,
            },
            delivery,
            expander: None,
            spies: HashSet::new(),
            modes: HashMap::new(),
        }
    }

    pub fn set_expander(&mut self, expander: Option<Arc<dyn PlaceholderExpander>>) {
        self.expander = expander;
    }

    pub fn has_expander(&self) -> bool {
        self.expander.is_some()
    }

    /// Fill one template for `sender`.
    pub fn render(
        &self,
        template: &str,
        guild: &Guild,
        role: &RoleDefinition,
        sender: &ChatSender,
        message: &str,
    ) -> String {
        let filled = template
            .replace("{role}", &role.name)
            .replace("{player}", &sender.name)
            .replace("{display-name}", &sender.display_name)
            .replace("{message}", message)
            .replace("{guild}", &guild.name);
        let colored = colorize(&filled);
        match &self.expander {
            Some(expander) => expander.expand(sender.id, &colored),
            None => colored,
        }
    }

    /// Plain delivery with no template, used for system notices.
    pub fn deliver_to(&self, recipient: Uuid, line: &str) {
        self.delivery.deliver(recipient, line);
    }

    fn deliver_to_guild(&self, guild: &Guild, line: &str) {
        for member in &guild.members {
            self.deliver_to(member.player_id, line);
        }
    }

    fn deliver_to_spies(&self, line: &str) {
        for spy in &self.spies {
            self.delivery.deliver(*spy, line);
        }
    }

    pub fn route_guild_chat(
        &self,
        guild: &Guild,
        role: &RoleDefinition,
        sender: &ChatSender,
        message: &str,
    ) {
        let line = self.render(&self.templates.guild, guild, role, sender, message);
        self.deliver_to_guild(guild, &line);

        let spy_line = self.render(&self.templates.spy, guild, role, sender, message);
        self.deliver_to_spies(&spy_line);
        if self.templates.log_guild {
            info!(target: "guild_chat", "{}", chat_log_line(&spy_line));
        }
    }

    /// Like [`ChatRouter::route_guild_chat`] but also fans the ally line out to
    /// every guild in `allies`.
    pub fn route_ally_chat(
        &self,
        guild: &Guild,
        allies: &[&Guild],
        role: &RoleDefinition,
        sender: &ChatSender,
        message: &str,
    ) {
        let line = self.render(&self.templates.ally, guild, role, sender, message);
        self.deliver_to_guild(guild, &line);
        for ally in allies {
            self.deliver_to_guild(ally, &line);
        }

        let spy_line = self.render(&self.templates.spy, guild, role, sender, message);
        self.deliver_to_spies(&spy_line);
        if self.templates.log_ally {
            info!(target: "guild_chat", "{}", chat_log_line(&spy_line));
        }
    }

    pub fn is_spy(&self, player: Uuid) -> bool {
        self.spies.contains(&player)
    }

    /// Flip spy mode, returning whether the player is now spying.
    pub fn toggle_spy(&mut self, player: Uuid) -> bool {
        if self.spies.remove(&player) {
            false
        } else {
            self.spies.insert(player);
            true
        }
    }

    pub fn spy_count(&self) -> usize {
        self.spies.len()
    }

    pub fn set_mode(&mut self, player: Uuid, mode: Option<ChatMode>) {
        match mode {
            Some(mode) => {
                self.modes.insert(player, mode);
            }
            None => {
                self.modes.remove(&player);
            }
        }
    }

    pub fn mode(&self, player: Uuid) -> Option<ChatMode> {
        self.modes.get(&player).copied()
    }

    /// Forget all transient chat state for a disconnecting player.
    pub fn logout(&mut self, player: Uuid) {
        self.spies.remove(&player);
        self.modes.remove(&player);
    }

    pub fn reset(&mut self) {
        self.spies.clear();
        self.modes.clear();
    }
}
