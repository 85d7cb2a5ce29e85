use thiserror::Error;

/// Errors that can arise while loading, mutating or persisting guild state.
#[derive(Debug, Error)]
pub enum GuildError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON errors (vault payloads).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, reading catalogs, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A catalog document (roles or tiers) could not be parsed at all.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// A catalog ended up with no usable entries.
    #[error("{0} catalog is empty; at least one entry is required")]
    EmptyCatalog(&'static str),

    /// A single stored vault slot could not be decoded.
    #[error("vault slot {slot} could not be decoded: {reason}")]
    Deserialization { slot: usize, reason: String },

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// The caller asked for something the current guild state does not allow.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Internal error (task join errors, unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

impl GuildError {
    /// True for failures the command layer should turn into a player-facing message.
    pub fn is_precondition(&self) -> bool {
        matches!(self, GuildError::Precondition(_))
    }
}

/// Player-triggered operations that were refused before touching any state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreconditionError {
    #[error("vault {slot} is locked for this tier (unlocked: {unlocked})")]
    VaultLocked { slot: usize, unlocked: usize },

    #[error("vault {0} does not exist")]
    VaultMissing(usize),

    #[error("vault {0} holds data that could not be read")]
    VaultCorrupt(usize),

    #[error("invite code {0} has no uses left")]
    CodeExhausted(String),

    #[error("invite code {0} was already redeemed by this player")]
    CodeAlreadyRedeemed(String),

    #[error("guild is full ({0} members)")]
    GuildFull(usize),

    #[error("player is already in a guild")]
    AlreadyInGuild,

    #[error("player is not in a guild")]
    NotInGuild,

    #[error("guild is already at the highest tier")]
    MaxTier,

    #[error("guild needs {required} members to rank up")]
    NotEnoughMembers { required: u32 },

    #[error("deposit would exceed the bank limit of {0}")]
    BankLimit(f64),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("{0} is not a valid amount")]
    InvalidAmount(f64),

    #[error("guild cannot have more than {0} allies")]
    AllyLimit(u32),

    #[error("a guild cannot target itself")]
    SameGuild,

    #[error("unknown role level {0}")]
    UnknownRole(i32),

    #[error("player has no invite to this guild")]
    NotInvited,

    #[error("'{0}' is not an allowed guild name")]
    InvalidName(String),

    #[error("'{0}' is not an allowed guild prefix")]
    InvalidPrefix(String),

    #[error("a guild named '{0}' already exists")]
    NameTaken(String),
}
