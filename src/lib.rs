//! # Guildhall - Guild registry for multiplayer game servers
//!
//! Guildhall owns the authoritative in-memory collection of player guilds and
//! everything that hangs off them: membership, roles and tiers, symmetric
//! alliances, item vaults, invite codes, the guild bank and guild/ally chat.
//!
//! ## Features
//!
//! - **Catalog-driven roles and tiers**: loaded from `roles.toml` and `tiers.toml`, with
//!   stored guilds repaired on load when a level disappears.
//! - **Symmetric alliances**: ally and pending-ally sets are only changed in pairs.
//! - **Vault cache**: stored vault payloads are decoded once at load and written back
//!   on save; unreadable slots keep their raw payload.
//! - **Permission propagation**: tier and role nodes pushed to an external service,
//!   inline or through a bounded tokio worker pool.
//! - **Sled persistence**: bincode records with a schema version, plus cooldown containers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use guildhall::config::Config;
//! use guildhall::guild::{RoleCatalog, TierCatalog};
//! use guildhall::permissions::{PermissionPropagator, PermissionService};
//! use guildhall::chat::ChatDelivery;
//! use guildhall::registry::GuildRegistry;
//! use guildhall::storage::SledGuildStore;
//!
//! # fn run(service: Arc<dyn PermissionService>, delivery: Arc<dyn ChatDelivery>) -> anyhow::Result<()> {
//! let config = Config::default();
//! let store = Arc::new(SledGuildStore::open(config.storage.resolved_db_path())?);
//! let mut registry = GuildRegistry::new(
//!     &config,
//!     RoleCatalog::load(config.roles_path())?,
//!     TierCatalog::load(config.tiers_path())?,
//!     store,
//!     PermissionPropagator::from_settings(service, &config.permissions),
//!     delivery,
//! )?;
//! registry.load_all()?;
//! // ... serve players ...
//! registry.save_all()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`registry`] - The guild registry and every runtime operation
//! - [`guild`] - Guild records, role and tier catalogs
//! - [`vault`] - Inventories and the per-guild vault cache
//! - [`chat`] - Guild, ally and spy chat routing
//! - [`permissions`] - Propagation of permission nodes to an external service
//! - [`storage`] - Guild and cooldown persistence
//! - [`config`] - Configuration management
//! - [`validation`] - Name, prefix and blacklist rules plus color-code helpers

pub mod chat;
pub mod config;
pub mod errors;
pub mod guild;
pub mod logutil;
pub mod permissions;
pub mod registry;
pub mod storage;
pub mod validation;
pub mod vault;

pub use errors::{GuildError, PreconditionError};
pub use registry::{GuildRegistry, LoadReport};
