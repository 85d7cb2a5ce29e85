mod common;

use common::Fixture;
use guildhall::config::Config;
use guildhall::errors::{GuildError, PreconditionError};
use guildhall::guild::DEFAULT_ROLES_TOML;

const ONE_ALLY_TIER: &str = r#"
[tiers.list.solo]
level = 1
name = "Solo"
max-allies = 1
"#;

#[test]
fn accepting_a_request_allies_both_sides() {
    let mut fx = Fixture::new();
    let (a, _) = fx.guild("Alpha");
    let (b, _) = fx.guild("Bravo");

    fx.registry.add_pending_ally(a, b).expect("pending");
    assert!(fx.registry.guild(a).expect("a").pending_allies().contains(&b));
    assert!(fx.registry.guild(b).expect("b").pending_allies().contains(&a));

    fx.registry.add_ally(a, b).expect("ally");
    assert!(fx.registry.is_ally(a, b));
    assert!(fx.registry.is_ally(b, a));
    assert!(fx.registry.guild(a).expect("a").pending_allies().is_empty());
    assert!(fx.registry.guild(b).expect("b").pending_allies().is_empty());

    fx.registry.remove_ally(b, a).expect("remove");
    assert!(!fx.registry.is_ally(a, b));
    assert!(!fx.registry.is_ally(b, a));
}

#[test]
fn removing_a_guild_purges_it_from_remaining_ally_lists() {
    let mut fx = Fixture::new();
    let (a, _) = fx.guild("Alpha");
    let (b, _) = fx.guild("Bravo");
    let (c, _) = fx.guild("Charlie");
    fx.registry.add_ally(a, b).expect("ally");
    fx.registry.add_pending_ally(a, c).expect("pending");

    fx.registry.remove_guild(a).expect("removed");

    assert!(!fx.registry.guild(b).expect("b").allies().contains(&a));
    assert!(!fx.registry.guild(c).expect("c").pending_allies().contains(&a));
}

#[test]
fn declining_a_request_clears_both_sides() {
    let mut fx = Fixture::new();
    let (a, _) = fx.guild("Alpha");
    let (b, _) = fx.guild("Bravo");
    fx.registry.add_pending_ally(a, b).expect("pending");
    fx.registry.remove_pending_ally(b, a).expect("decline");
    assert!(fx.registry.guild(a).expect("a").pending_allies().is_empty());
    assert!(fx.registry.guild(b).expect("b").pending_allies().is_empty());
}

#[test]
fn a_guild_cannot_ally_itself_or_a_missing_guild() {
    let mut fx = Fixture::new();
    let (a, _) = fx.guild("Alpha");
    assert!(matches!(
        fx.registry.add_ally(a, a),
        Err(GuildError::Precondition(PreconditionError::SameGuild))
    ));
    assert!(matches!(
        fx.registry.add_ally(a, uuid::Uuid::new_v4()),
        Err(GuildError::NotFound(_))
    ));
    assert!(fx.registry.guild(a).expect("a").allies().is_empty());
}

#[test]
fn ally_limit_refuses_without_touching_either_guild() {
    let mut fx = Fixture::with_catalogs(Config::default(), DEFAULT_ROLES_TOML, ONE_ALLY_TIER);
    let (a, _) = fx.guild("Alpha");
    let (b, _) = fx.guild("Bravo");
    let (c, _) = fx.guild("Charlie");
    fx.registry.add_ally(a, b).expect("first ally");

    assert!(matches!(
        fx.registry.add_ally(a, c),
        Err(GuildError::Precondition(PreconditionError::AllyLimit(1)))
    ));
    assert!(!fx.registry.is_ally(c, a));
    assert!(fx.registry.guild(c).expect("c").allies().is_empty());
    // Re-adding an existing ally is not blocked by the limit.
    fx.registry.add_ally(b, a).expect("idempotent");
}

#[test]
fn disband_purges_guild_from_every_alliance_list() {
    let mut fx = Fixture::new();
    let (a, _) = fx.guild("Alpha");
    let (b, _) = fx.guild("Bravo");
    let (c, _) = fx.guild("Charlie");
    fx.registry.add_ally(a, b).expect("ally");
    fx.registry.add_pending_ally(a, c).expect("pending");

    let removed = fx.registry.disband(a).expect("disband");
    assert_eq!(removed.id, a);
    assert!(fx.registry.guild(a).is_none());
    assert!(fx.registry.guild(b).expect("b").allies().is_empty());
    assert!(fx.registry.guild(c).expect("c").pending_allies().is_empty());
    assert!(matches!(fx.registry.disband(a), Err(GuildError::NotFound(_))));
}

#[test]
fn disband_revokes_role_and_tier_nodes() {
    let mut fx = Fixture::new();
    let (a, master) = fx.guild("Alpha");
    let members = fx.add_members(a, 2);
    fx.permissions.clear();

    fx.registry.disband(a).expect("disband");
    assert_eq!(fx.permissions.nodes_for("revoke", master), vec!["guilds.role.gm"]);
    for member in members {
        assert_eq!(
            fx.permissions.nodes_for("revoke", member),
            vec!["guilds.role.member"]
        );
    }
}

#[test]
fn player_level_ally_and_same_guild_checks() {
    let mut fx = Fixture::new();
    let (a, master_a) = fx.guild("Alpha");
    let (b, master_b) = fx.guild("Bravo");
    let mate = fx.add_members(a, 1)[0];

    assert!(fx.registry.is_same_guild(master_a, mate));
    assert!(!fx.registry.is_same_guild(master_a, master_b));
    assert!(!fx.registry.is_ally_player(mate, master_b));
    fx.registry.add_ally(a, b).expect("ally");
    assert!(fx.registry.is_ally_player(mate, master_b));
}

#[test]
fn notify_allies_reaches_every_ally_member() {
    let mut fx = Fixture::new();
    let (a, _) = fx.guild("Alpha");
    let (b, master_b) = fx.guild("Bravo");
    let extra = fx.add_members(b, 1)[0];
    fx.registry.add_ally(a, b).expect("ally");

    let delivered = fx.registry.notify_allies(a, "Alpha levelled up").expect("notify");
    assert_eq!(delivered, 2);
    assert_eq!(fx.outbox.for_player(master_b), vec!["Alpha levelled up"]);
    assert_eq!(fx.outbox.for_player(extra), vec!["Alpha levelled up"]);
}
