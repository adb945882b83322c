//! Step definitions

use cucumber::{given, then, when};

use qatrain_common::config::{DB_PASSWORD, DB_URL, DB_USERNAME};
use qatrain_common::{resolve, ResetTrigger};
use qatrain_e2e::DatabaseResetter;

use super::HarnessWorld;

#[given(expr = "the database url {string}")]
fn database_url(world: &mut HarnessWorld, url: String) {
    world.env.insert(DB_URL.to_string(), url);
}

#[given(expr = "the database username {string}")]
fn database_username(world: &mut HarnessWorld, username: String) {
    world.env.insert(DB_USERNAME.to_string(), username);
}

#[given(expr = "the database password {string}")]
fn database_password(world: &mut HarnessWorld, password: String) {
    world.env.insert(DB_PASSWORD.to_string(), password);
}

#[given(expr = "the setting {word} is {string}")]
fn setting(world: &mut HarnessWorld, key: String, value: String) {
    world.env.insert(key, value);
}

#[when("the connection string is resolved")]
fn resolve_connection_string(world: &mut HarnessWorld) {
    let database = world.config().database;
    let raw = database.url.clone().unwrap_or_default();
    world.resolved = Some(resolve(&raw, &database.overrides()).map_err(|e| e.to_string()));
}

#[when(expr = "the reset is planned for {word}")]
fn plan_reset(world: &mut HarnessWorld, trigger: String) {
    let trigger: ResetTrigger = trigger.parse().expect("known trigger");
    let resetter = DatabaseResetter::new(world.config().database);
    world.plan = Some(resetter.plan(trigger));
}

#[then(expr = "the host is {string}")]
fn host_is(world: &mut HarnessWorld, host: String) {
    assert_eq!(world.descriptor().host, host);
}

#[then(expr = "the port is {int}")]
fn port_is(world: &mut HarnessWorld, port: u16) {
    assert_eq!(world.descriptor().port, port);
}

#[then(expr = "the database is {string}")]
fn database_is(world: &mut HarnessWorld, database: String) {
    assert_eq!(world.descriptor().database, database);
}

/// `none` stands for an absent user
#[then(expr = "the user is {string}")]
fn user_is(world: &mut HarnessWorld, user: String) {
    let expected = (user != "none").then_some(user);
    assert_eq!(world.descriptor().user, expected);
}

#[then(expr = "the password is {string}")]
fn password_is(world: &mut HarnessWorld, password: String) {
    assert_eq!(world.descriptor().password.as_deref(), Some(password.as_str()));
}

#[then("the connection uses TLS")]
fn uses_tls(world: &mut HarnessWorld) {
    assert!(world.descriptor().tls);
}

#[then(expr = "resolution fails mentioning {string}")]
fn resolution_fails(world: &mut HarnessWorld, fragment: String) {
    match world.resolved.as_ref() {
        Some(Err(e)) => assert!(e.contains(&fragment), "{e}"),
        other => panic!("expected a resolution error, got {other:?}"),
    }
}

#[then("the reset is enabled")]
fn reset_enabled(world: &mut HarnessWorld) {
    let decision = world.plan().decision;
    assert!(decision.enabled, "{decision:?}");
    assert_eq!(decision.reason, None);
}

#[then("the reset is not enabled")]
fn reset_not_enabled(world: &mut HarnessWorld) {
    let decision = world.plan().decision;
    assert!(!decision.enabled, "{decision:?}");
    assert_eq!(decision.reason, None);
}

#[then(expr = "the reset is refused because {string}")]
fn reset_refused(world: &mut HarnessWorld, reason: String) {
    let decision = world.plan().decision;
    assert!(!decision.enabled);
    let actual = decision.reason.map(|r| r.to_string());
    assert_eq!(actual.as_deref(), Some(reason.as_str()));
}
