mod common;

use common::Fixture;
use guildhall::errors::{GuildError, PreconditionError};
use guildhall::guild::{Guild, GuildMember, DEFAULT_ROLES_TOML};
use guildhall::storage::GuildStore;
use guildhall::vault::ItemStack;
use uuid::Uuid;

const SINGLE_TIER: &str = r#"
[tiers.list.only]
level = 1
name = "Only"
"#;

#[test]
fn dangling_levels_fall_back_to_lowest_on_load() {
    let mut fx = Fixture::new();
    let master = Uuid::new_v4();
    let mut guild = Guild::new("Knights", "K", GuildMember::new(master, 7, "Art"), 99);
    guild.creation_timestamp = 0;
    fx.store.save_all_guilds(&[guild.clone()]).expect("seed");

    let report = fx.registry.load_all().expect("load");
    assert_eq!(report.guilds, 1);
    assert_eq!(report.tiers_repaired, 1);
    assert_eq!(report.roles_repaired, 1);
    assert_eq!(report.timestamps_backfilled, 1);

    let loaded = fx.registry.guild(guild.id).expect("guild");
    assert_eq!(loaded.tier_level, 1);
    assert_eq!(loaded.members[0].role_level, 3);
    assert!(loaded.creation_timestamp > 0);
}

#[test]
fn shrinking_tier_catalog_repairs_after_restart() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Climbers");
    fx.registry.deposit(id, 1000.0).expect("deposit");
    assert_eq!(fx.registry.upgrade_tier(id).expect("upgrade"), 2);
    fx.registry.save_all().expect("save");

    let mut fx = fx.restart_with(DEFAULT_ROLES_TOML, SINGLE_TIER);
    let report = fx.registry.load_all().expect("load");
    assert_eq!(report.tiers_repaired, 1);
    let guild = fx.registry.guild(id).expect("guild");
    assert_eq!(guild.tier_level, 1);
    assert_eq!(fx.registry.tier_of(guild).name, "Only");
    assert!(fx.registry.is_max_tier(guild));
}

#[test]
fn unmapped_levels_resolve_to_lowest_definitions() {
    let fx = Fixture::new();
    assert_eq!(fx.registry.guild_tier(42).level, 1);
    assert_eq!(fx.registry.guild_role(-5).level, 3);
    assert_eq!(fx.registry.guild_role(1).name, "Officer");
}

#[test]
fn vault_contents_survive_save_and_reload() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Vaulters");
    {
        let vault = fx.registry.open_vault(id, 1).expect("vault");
        assert_eq!(vault.size(), 54);
        vault.set(0, ItemStack::new("diamond", 12)).expect("slot");
    }
    assert_eq!(fx.registry.guild(id).expect("guild").vault_count(), 1);
    fx.registry.save_all().expect("save");

    let mut fx = fx.restart();
    fx.registry.load_all().expect("load");
    let vault = fx.registry.get_vault(id, 1).expect("vault");
    assert_eq!(vault.get(0), Some(&ItemStack::new("diamond", 12)));
    assert_eq!(vault.title, "Guild Vault");
}

#[test]
fn unreadable_vault_payload_is_kept_verbatim() {
    let mut fx = Fixture::new();
    let mut guild = Guild::new("Broken", "B", GuildMember::new(Uuid::new_v4(), 0, "Bo"), 1);
    guild.vaults_serialized = Some(vec!["definitely not json".to_string()]);
    fx.store.save_all_guilds(&[guild.clone()]).expect("seed");

    let report = fx.registry.load_all().expect("load");
    assert_eq!(report.unreadable_vaults, 1);
    assert_eq!(fx.registry.vault_cache_len(guild.id), 1);
    match fx.registry.get_vault(guild.id, 1) {
        Err(GuildError::Precondition(PreconditionError::VaultCorrupt(1))) => {}
        other => panic!("unexpected result: {:?}", other.map(|v| v.title.clone())),
    }

    fx.registry.save_all().expect("save");
    let stored = fx.store.get_guild(&guild.id.to_string()).expect("stored");
    assert_eq!(
        stored.vaults_serialized,
        Some(vec!["definitely not json".to_string()])
    );
}

#[test]
fn remove_guild_evicts_and_deletes_from_storage() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Ephemeral");
    fx.registry.open_vault(id, 1).expect("vault");
    fx.registry.save_all().expect("save");

    let removed = fx.registry.remove_guild(id).expect("removed");
    assert_eq!(removed.name, "Ephemeral");
    assert!(fx.registry.guild(id).is_none());
    assert_eq!(fx.registry.vault_cache_len(id), 0);
    assert!(matches!(
        fx.store.get_guild(&id.to_string()),
        Err(GuildError::NotFound(_))
    ));
    assert!(fx.registry.remove_guild(id).is_none());
}

#[test]
fn replacing_a_guild_without_vaults_drops_its_cached_vaults() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Refit");
    fx.registry
        .open_vault(id, 1)
        .expect("vault")
        .set(0, ItemStack::new("diamond", 1))
        .expect("slot");
    let mut replacement = fx.registry.guild(id).expect("guild").clone();
    replacement.vaults_serialized = None;

    fx.registry.add_guild(replacement);
    assert_eq!(fx.registry.vault_cache_len(id), 0);

    fx.registry.save_all().expect("save");
    let stored = fx.store.get_guild(&id.to_string()).expect("stored");
    assert_eq!(stored.vaults_serialized, None);
}

#[test]
fn save_all_drops_records_of_removed_guilds() {
    let mut fx = Fixture::new();
    let (keep, _) = fx.guild("Keep");
    let (gone, _) = fx.guild("Gone");
    fx.registry.save_all().expect("save");
    fx.registry.remove_guild(gone);
    fx.registry.save_all().expect("save again");

    let ids: Vec<Uuid> = fx
        .store
        .load_all_guilds()
        .expect("load")
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(ids, vec![keep]);
}

#[test]
fn lookups_find_guilds_by_player_code_and_id() {
    let mut fx = Fixture::new();
    let (id, master) = fx.guild("Lookup");
    let code = fx.registry.create_code(id, master, 3).expect("code");

    assert_eq!(fx.registry.guild_by_player(master).map(|g| g.id), Some(id));
    assert_eq!(fx.registry.guild_by_code(&code).map(|g| g.id), Some(id));
    assert_eq!(fx.registry.name_by_id(id).as_deref(), Some("Lookup"));
    assert_eq!(
        fx.registry.guild_member(master).map(|m| m.role_level),
        Some(0)
    );
    assert_eq!(fx.registry.guild_count(), 1);
    assert!(fx.registry.guild_by_player(Uuid::new_v4()).is_none());
}
