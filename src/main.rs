//! Binary entrypoint for the Guildhall CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`, default `roles.toml`/`tiers.toml` and open the database
//! - `status` - load every guild and print a short summary
//! - `reconcile` - load, repair dangling tier/role levels and save back
//!
//! See the library crate docs for module-level details: `guildhall::`.
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, info};
use uuid::Uuid;

use guildhall::chat::ChatDelivery;
use guildhall::config::Config;
use guildhall::guild::{RoleCatalog, TierCatalog, DEFAULT_ROLES_TOML, DEFAULT_TIERS_TOML};
use guildhall::permissions::{PermissionPropagator, PermissionService};
use guildhall::registry::GuildRegistry;
use guildhall::storage::{CooldownStore, SledGuildStore};
use guildhall::validation::strip_colors;

#[derive(Parser)]
#[command(name = "guildhall")]
#[command(about = "Guild registry maintenance for multiplayer game servers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default configuration and catalogs
    Init,
    /// Show guild counts and per-guild summaries
    Status,
    /// Repair stored guilds against the current catalogs and save them
    Reconcile,
}

/// Offline runs have nobody connected, so permission changes are only logged.
struct LoggedPermissions;

impl PermissionService for LoggedPermissions {
    fn grant(&self, subject: Uuid, node: &str) -> anyhow::Result<()> {
        debug!("grant {} -> {}", node, subject);
        Ok(())
    }

    fn revoke(&self, subject: Uuid, node: &str) -> anyhow::Result<()> {
        debug!("revoke {} -> {}", node, subject);
        Ok(())
    }
}

struct LoggedDelivery;

impl ChatDelivery for LoggedDelivery {
    fn deliver(&self, recipient: Uuid, message: &str) {
        debug!("to {}: {}", recipient, guildhall::logutil::chat_log_line(message));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new Guildhall configuration");
            let cfg = if Path::new(&cli.config).exists() {
                info!("Keeping existing configuration at {}", cli.config);
                Config::load(&cli.config).await?
            } else {
                Config::create_default(&cli.config).await?;
                info!("Configuration file created at {}", cli.config);
                Config::default()
            };

            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            for (path, contents) in [
                (cfg.roles_path(), DEFAULT_ROLES_TOML),
                (cfg.tiers_path(), DEFAULT_TIERS_TOML),
            ] {
                if !path.exists() {
                    tokio::fs::write(&path, contents).await?;
                    info!("Wrote {}", path.display());
                }
            }

            let store = SledGuildStore::open(cfg.storage.resolved_db_path())?;
            store.create_container(cfg.storage.cooldown_prefix.as_deref())?;
            info!(
                "Initialized guild database at {}",
                cfg.storage.resolved_db_path().display()
            );
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let registry = open_registry(&config)?;
            print_status(&registry);
        }
        Commands::Reconcile => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let mut registry = open_registry(&config)?;
            let report = registry.last_report.clone();
            registry.inner.save_all()?;
            println!(
                "guilds: {}  tier repairs: {}  role repairs: {}  timestamps backfilled: {}  unreadable vaults: {}",
                report.guilds,
                report.tiers_repaired,
                report.roles_repaired,
                report.timestamps_backfilled,
                report.unreadable_vaults
            );
        }
    }

    Ok(())
}

struct Loaded {
    inner: GuildRegistry,
    last_report: guildhall::LoadReport,
}

fn open_registry(config: &Config) -> Result<Loaded> {
    let roles = RoleCatalog::load(config.roles_path())?;
    let tiers = TierCatalog::load(config.tiers_path())?;
    let store = Arc::new(SledGuildStore::open(config.storage.resolved_db_path())?);
    let permissions = PermissionPropagator::from_settings(Arc::new(LoggedPermissions), &config.permissions);
    let mut inner = GuildRegistry::new(config, roles, tiers, store, permissions, Arc::new(LoggedDelivery))?;
    let last_report = inner.load_all()?;
    Ok(Loaded { inner, last_report })
}

fn print_status(loaded: &Loaded) {
    let registry = &loaded.inner;
    println!("Guildhall v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "{} guilds, {} roles, {} tiers (max level {})",
        registry.guild_count(),
        registry.roles().len(),
        registry.tiers().len(),
        registry.max_tier_level()
    );
    for guild in registry.guilds() {
        let tier = registry.tier_of(guild);
        println!(
            "  {} [{}] tier {} ({}), {}/{} members, {} allies, {} vaults, balance {:.2}{}",
            strip_colors(&guild.name),
            strip_colors(&guild.prefix),
            tier.level,
            tier.name,
            guild.size(),
            tier.max_members,
            guild.allies().len(),
            guild.vault_count(),
            guild.balance,
            if guild.is_private { ", private" } else { "" }
        );
    }
    if loaded.last_report.unreadable_vaults > 0 {
        println!(
            "{} vault slots could not be read and will be preserved as-is",
            loaded.last_report.unreadable_vaults
        );
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    match log_file {
        Some(f) => {
            let write_mutex = Arc::new(std::sync::Mutex::new(f));
            // Only echo to the console when attached to a terminal
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
