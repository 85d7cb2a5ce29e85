mod common;

use common::Fixture;
use guildhall::config::{Config, GuildSettings};
use guildhall::errors::{GuildError, PreconditionError};
use uuid::Uuid;

#[test]
fn invite_code_refuses_once_uses_run_out() {
    let mut fx = Fixture::new();
    let (id, master) = fx.guild("Coders");
    let code = fx.registry.create_code(id, master, 1).expect("code");
    assert_eq!(code.len(), 10);

    let first = Uuid::new_v4();
    assert_eq!(fx.registry.redeem_code(&code, first, "First").expect("redeem"), id);
    assert!(fx.registry.guild(id).expect("guild").is_member(first));

    let second = Uuid::new_v4();
    match fx.registry.redeem_code(&code, second, "Second") {
        Err(GuildError::Precondition(PreconditionError::CodeExhausted(c))) => assert_eq!(c, code),
        other => panic!("unexpected: {:?}", other),
    }
    let guild = fx.registry.guild(id).expect("guild");
    assert!(!guild.is_member(second));
    let stored = guild.code(&code).expect("code kept");
    assert_eq!(stored.remaining_uses, 0);
    assert_eq!(stored.redeemers.len(), 1);
}

#[test]
fn redeeming_requires_a_known_code_and_no_guild() {
    let mut fx = Fixture::new();
    let (id, master) = fx.guild("Coders");
    let (_, other_master) = fx.guild("Others");
    let code = fx.registry.create_code(id, master, 5).expect("code");

    assert!(matches!(
        fx.registry.redeem_code("nope", Uuid::new_v4(), "X"),
        Err(GuildError::NotFound(_))
    ));
    assert!(matches!(
        fx.registry.redeem_code(&code, other_master, "Busy"),
        Err(GuildError::Precondition(PreconditionError::AlreadyInGuild))
    ));
    assert_eq!(
        fx.registry.guild(id).expect("guild").code(&code).expect("code").remaining_uses,
        5
    );
}

#[test]
fn code_listing_and_redeemers_use_cached_names() {
    let mut fx = Fixture::new();
    let (id, master) = fx.guild("Coders");
    let code = fx.registry.create_code(id, master, 2).expect("code");
    let joiner = Uuid::new_v4();
    fx.registry.redeem_code(&code, joiner, "Joiner").expect("redeem");

    assert_eq!(
        fx.registry.code_listing(id).expect("listing"),
        vec![format!("{} (1 uses left) by CodersMaster", code)]
    );
    assert_eq!(
        fx.registry.code_redeemers(id, &code).expect("redeemers"),
        vec!["Joiner".to_string()]
    );
    fx.registry.delete_code(id, &code).expect("delete");
    assert!(fx.registry.guild_by_code(&code).is_none());
}

#[test]
fn private_guilds_need_an_invite() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Secret");
    let (open, _) = fx.guild("Open");
    assert!(fx.registry.toggle_private(id).expect("toggle"));

    let player = Uuid::new_v4();
    assert!(matches!(
        fx.registry.join_guild(id, player, "Pat"),
        Err(GuildError::Precondition(PreconditionError::NotInvited))
    ));
    assert_eq!(fx.registry.public_guilds(), vec!["Open".to_string()]);
    assert_eq!(fx.registry.joinable_guilds(player), vec!["Open".to_string()]);

    assert!(fx.registry.invite_player(id, player).expect("invite"));
    assert_eq!(fx.registry.invited_guilds(player), vec!["Secret".to_string()]);
    assert_eq!(fx.registry.joinable_guilds(player).len(), 2);

    fx.registry.join_guild(id, player, "Pat").expect("join");
    assert!(!fx.registry.guild(id).expect("guild").is_invited(player));
    assert!(fx.registry.invited_guilds(player).is_empty());
    assert!(matches!(
        fx.registry.join_guild(open, player, "Pat"),
        Err(GuildError::Precondition(PreconditionError::AlreadyInGuild))
    ));
}

#[test]
fn joining_and_leaving_propagate_role_nodes() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Nodes");
    let player = Uuid::new_v4();
    fx.registry.join_guild(id, player, "Pat").expect("join");
    assert_eq!(fx.permissions.nodes_for("grant", player), vec!["guilds.role.member"]);
    assert_eq!(fx.registry.cached_player_name(player), Some("Pat"));

    let member = fx.registry.leave_guild(player).expect("leave");
    assert_eq!(member.display_name, "Pat");
    assert_eq!(fx.permissions.nodes_for("revoke", player), vec!["guilds.role.member"]);
    assert!(fx.registry.guild_by_player(player).is_none());
    assert!(matches!(
        fx.registry.leave_guild(player),
        Err(GuildError::Precondition(PreconditionError::NotInGuild))
    ));
}

#[test]
fn promotion_swaps_role_node() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Ranks");
    let player = fx.add_members(id, 1)[0];
    fx.permissions.clear();

    fx.registry.set_member_role(player, 1).expect("promote");
    assert_eq!(fx.permissions.nodes_for("revoke", player), vec!["guilds.role.member"]);
    assert_eq!(fx.permissions.nodes_for("grant", player), vec!["guilds.role.officer"]);
    assert!(matches!(
        fx.registry.set_member_role(player, 42),
        Err(GuildError::Precondition(PreconditionError::UnknownRole(42)))
    ));
    assert_eq!(fx.registry.guild_member(player).expect("member").role_level, 1);
}

#[test]
fn transfer_demotes_previous_master() {
    let mut fx = Fixture::new();
    let (id, master) = fx.guild("Heirs");
    let heir = fx.add_members(id, 1)[0];

    fx.registry.transfer_guild(id, heir).expect("transfer");
    assert_eq!(fx.registry.guild_member(heir).expect("heir").role_level, 0);
    assert_eq!(fx.registry.guild_member(master).expect("old").role_level, 1);
}

#[test]
fn inviters_are_members_whose_role_can_invite() {
    let mut fx = Fixture::new();
    let (id, master) = fx.guild("Inviters");
    let plain = fx.add_members(id, 1)[0];
    let veteran = fx.add_members(id, 1)[0];
    fx.registry.set_member_role(veteran, 2).expect("veteran");

    let guild = fx.registry.guild(id).expect("guild");
    let inviters = fx.registry.inviters(guild);
    assert!(inviters.contains(&master));
    assert!(inviters.contains(&veteran));
    assert!(!inviters.contains(&plain));
}

#[test]
fn bank_respects_tier_limit_and_balance() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Bankers");
    assert_eq!(fx.registry.deposit(id, 10_000.0).expect("deposit"), 10_000.0);
    assert!(matches!(
        fx.registry.deposit(id, 1.0),
        Err(GuildError::Precondition(PreconditionError::BankLimit(limit))) if limit == 10_000.0
    ));
    assert_eq!(fx.registry.withdraw(id, 2_500.0).expect("withdraw"), 7_500.0);
    assert!(matches!(
        fx.registry.withdraw(id, 20_000.0),
        Err(GuildError::Precondition(PreconditionError::InsufficientFunds))
    ));
    assert_eq!(fx.registry.guild(id).expect("guild").balance, 7_500.0);
}

#[test]
fn bank_refuses_non_finite_amounts() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Vaultless");
    fx.registry.deposit(id, 500.0).expect("deposit");
    for amount in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(
            fx.registry.deposit(id, amount),
            Err(GuildError::Precondition(PreconditionError::InvalidAmount(_)))
        ));
        assert!(matches!(
            fx.registry.withdraw(id, amount),
            Err(GuildError::Precondition(PreconditionError::InvalidAmount(_)))
        ));
    }
    assert_eq!(fx.registry.guild(id).expect("guild").balance, 500.0);
}

#[test]
fn guild_settings_can_be_changed() {
    let mut fx = Fixture::new();
    let (id, _) = fx.guild("Before");
    let (_, _) = fx.guild("Taken");

    fx.registry.rename_guild(id, "After").expect("rename");
    assert!(fx.registry.guild_by_name("After").is_some());
    assert!(matches!(
        fx.registry.rename_guild(id, "taken"),
        Err(GuildError::Precondition(PreconditionError::NameTaken(_)))
    ));
    fx.registry.set_prefix(id, "AFT").expect("prefix");
    assert!(matches!(
        fx.registry.set_prefix(id, "bad prefix!"),
        Err(GuildError::Precondition(PreconditionError::InvalidPrefix(_)))
    ));
    fx.registry.set_motd(id, Some("Welcome")).expect("motd");
    let guild = fx.registry.guild(id).expect("guild");
    assert_eq!(guild.prefix, "AFT");
    assert_eq!(guild.motd.as_deref(), Some("Welcome"));
}

#[test]
fn rename_folds_case_like_create() {
    let config = Config {
        guild: GuildSettings {
            name_requirements: r"\p{L}{1,64}".to_string(),
            ..GuildSettings::default()
        },
        ..Config::default()
    };
    let mut fx = Fixture::with_config(config);
    let (_, _) = fx.guild("Ärger");
    let (other, _) = fx.guild("Zorn");

    assert!(matches!(
        fx.registry.rename_guild(other, "ärger"),
        Err(GuildError::Precondition(PreconditionError::NameTaken(_)))
    ));
    fx.registry.rename_guild(other, "ZORN").expect("own name in new case");
    assert_eq!(fx.registry.name_by_id(other).as_deref(), Some("ZORN"));
}
