//! Guild aggregate and the reference catalogs it points into.

pub mod role;
pub mod tier;
pub mod types;

pub use role::{GuildRolePerm, RoleCatalog, RoleDefinition, DEFAULT_ROLES_TOML};
pub use tier::{TierCatalog, TierDefinition, DEFAULT_TIERS_TOML};
pub use types::{Guild, GuildCode, GuildMember, GUILD_SCHEMA_VERSION};
