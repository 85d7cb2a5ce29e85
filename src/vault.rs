//! Guild vault inventories and their in-memory cache.
//!
//! A guild persists each vault as an opaque JSON string in
//! [`Guild::vaults_serialized`]. The [`VaultCache`] holds the decoded working
//! copies, keyed by guild id and index-aligned with the serialized list.
//! Slots whose stored payload cannot be decoded keep their raw text so the
//! cache stays aligned and the data is written back untouched on save.

use std::collections::HashMap;

use log::{error, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{GuildError, PreconditionError};
use crate::guild::Guild;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: String,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_id: &str, quantity: u32) -> Self {
        Self {
            item_id: item_id.to_string(),
            quantity,
        }
    }
}

/// Fixed-size grid of optional item stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub title: String,
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    pub fn new(title: &str, size: usize) -> Self {
        Self {
            title: title.to_string(),
            slots: vec![None; size],
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Place `stack` in `slot`, returning what was there. Out-of-range slots are refused.
    pub fn set(&mut self, slot: usize, stack: ItemStack) -> Result<Option<ItemStack>, ItemStack> {
        match self.slots.get_mut(slot) {
            Some(cell) => Ok(cell.replace(stack)),
            None => Err(stack),
        }
    }

    pub fn take(&mut self, slot: usize) -> Option<ItemStack> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

pub fn serialize_inventory(inventory: &Inventory) -> Result<String, GuildError> {
    Ok(serde_json::to_string(inventory)?)
}

pub fn deserialize_inventory(payload: &str) -> Result<Inventory, GuildError> {
    Ok(serde_json::from_str(payload)?)
}

#[derive(Debug, Clone, PartialEq)]
pub enum VaultSlot {
    Loaded(Inventory),
    /// Stored payload that failed to decode, kept verbatim.
    Unreadable(String),
}

#[derive(Debug, Default)]
pub struct VaultCache {
    entries: HashMap<Uuid, Vec<VaultSlot>>,
}

impl VaultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every serialized vault of `guild` into the cache, replacing any
    /// previous entry. A guild that never opened a vault gets no entry.
    /// Returns the number of slots that failed to decode.
    pub fn build(&mut self, guild: &Guild) -> usize {
        let Some(serialized) = guild.vaults_serialized.as_ref() else {
            self.entries.remove(&guild.id);
            return 0;
        };
        let mut failures = 0;
        let slots = serialized
            .iter()
            .enumerate()
            .map(|(idx, payload)| match deserialize_inventory(payload) {
                Ok(inventory) => VaultSlot::Loaded(inventory),
                Err(e) => {
                    failures += 1;
                    let err = GuildError::Deserialization {
                        slot: idx + 1,
                        reason: e.to_string(),
                    };
                    warn!("Guild {} ({}): {}", guild.name, guild.id, err);
                    VaultSlot::Unreadable(payload.clone())
                }
            })
            .collect();
        self.entries.insert(guild.id, slots);
        failures
    }

    /// Write the cached vaults back into `guild.vaults_serialized` in slot order.
    ///
    /// A slot that fails to serialize keeps its previous stored payload; the
    /// failure is reported after every other slot has been written.
    pub fn flatten_into(&self, guild: &mut Guild) -> Result<(), GuildError> {
        let Some(slots) = self.entries.get(&guild.id) else {
            return Ok(());
        };
        let previous = guild.vaults_serialized.take().unwrap_or_default();
        let mut out = Vec::with_capacity(slots.len());
        let mut first_error = None;
        for (idx, slot) in slots.iter().enumerate() {
            match slot {
                VaultSlot::Loaded(inventory) => match serialize_inventory(inventory) {
                    Ok(text) => out.push(text),
                    Err(e) => {
                        error!("Failed to serialize vault {} of guild {}: {}", idx + 1, guild.id, e);
                        out.push(previous.get(idx).cloned().unwrap_or_default());
                        first_error.get_or_insert(e);
                    }
                },
                VaultSlot::Unreadable(raw) => out.push(raw.clone()),
            }
        }
        guild.vaults_serialized = Some(out);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn slot_ref(&self, guild_id: Uuid, slot_number: usize) -> Result<&VaultSlot, PreconditionError> {
        slot_number
            .checked_sub(1)
            .and_then(|idx| self.entries.get(&guild_id).and_then(|slots| slots.get(idx)))
            .ok_or(PreconditionError::VaultMissing(slot_number))
    }

    /// 1-indexed vault lookup.
    pub fn get(&self, guild_id: Uuid, slot_number: usize) -> Result<&Inventory, PreconditionError> {
        match self.slot_ref(guild_id, slot_number)? {
            VaultSlot::Loaded(inventory) => Ok(inventory),
            VaultSlot::Unreadable(_) => Err(PreconditionError::VaultCorrupt(slot_number)),
        }
    }

    pub fn get_mut(
        &mut self,
        guild_id: Uuid,
        slot_number: usize,
    ) -> Result<&mut Inventory, PreconditionError> {
        let slot = slot_number
            .checked_sub(1)
            .and_then(|idx| self.entries.get_mut(&guild_id).and_then(|slots| slots.get_mut(idx)))
            .ok_or(PreconditionError::VaultMissing(slot_number))?;
        match slot {
            VaultSlot::Loaded(inventory) => Ok(inventory),
            VaultSlot::Unreadable(_) => Err(PreconditionError::VaultCorrupt(slot_number)),
        }
    }

    /// Append a vault for `guild_id`, returning its 1-indexed slot number.
    pub fn push(&mut self, guild_id: Uuid, inventory: Inventory) -> usize {
        let slots = self.entries.entry(guild_id).or_default();
        slots.push(VaultSlot::Loaded(inventory));
        slots.len()
    }

    pub fn remove(&mut self, guild_id: Uuid) -> Option<Vec<VaultSlot>> {
        self.entries.remove(&guild_id)
    }

    pub fn contains(&self, guild_id: Uuid) -> bool {
        self.entries.contains_key(&guild_id)
    }

    pub fn len_for(&self, guild_id: Uuid) -> usize {
        self.entries.get(&guild_id).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
