use std::fs;
use std::io::Write;

use talon_engine::config::ScriptSettings;
use talon_engine::host::ScriptHost;
use talon_engine::instance::BindingState;
use tempfile::NamedTempFile;
use uuid::Uuid;

const ACTOR_MODULE: &str = r#"
    fn Actor(id) {
        let obj = Entity(id);
        obj.speed = float(1.0);
        obj
    }
    fn Actor_on_update(dt) { }
"#;

fn write_module(contents: &str) -> NamedTempFile {
    let mut temp = NamedTempFile::new().expect("temp module");
    write!(temp, "{contents}").expect("write module");
    temp
}

fn host_with(game: &str) -> (ScriptHost, NamedTempFile, NamedTempFile) {
    let core = write_module(
        r#"
            fn Entity(id) {
                #{ "__base": "Entity", "__id": id }
            }
        "#,
    );
    let game = write_module(game);
    let settings = ScriptSettings {
        game_module: game.path().to_path_buf(),
        core_module: core.path().to_path_buf(),
        ..ScriptSettings::default()
    };
    let mut host = ScriptHost::new(settings);
    host.init().expect("host init should succeed");
    host.on_runtime_start(Uuid::new_v4());
    (host, core, game)
}

#[test]
fn field_values_survive_reload_and_rebind() {
    let (mut host, _core, _game) = host_with(ACTOR_MODULE);
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Actor").expect("bind should succeed");
    host.update(0.016);

    host.set_field_value(entity, "speed", 7.5f32).expect("set should succeed");
    assert_eq!(host.get_field_value::<f32>(entity, "speed").expect("live read"), 7.5);

    host.reload().expect("reload should succeed");
    assert_eq!(host.instance_state(entity), Some(BindingState::Invalidated));
    // Not live any more; the buffered table answers instead.
    assert_eq!(host.get_field_value::<f32>(entity, "speed").expect("buffered read"), 7.5);

    host.bind_entity(entity, "Actor").expect("rebinding an invalidated entity is allowed");
    host.update(0.016);
    assert_eq!(host.instance_state(entity), Some(BindingState::Live));
    assert_eq!(host.get_field_value::<f32>(entity, "speed").expect("restored read"), 7.5);
}

#[test]
fn mismatched_field_types_are_rejected() {
    let (mut host, _core, _game) = host_with(ACTOR_MODULE);
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Actor").expect("bind should succeed");
    host.update(0.016);

    let err = host.set_field_value(entity, "speed", 3i32).expect_err("speed is a float field");
    assert!(err.to_string().contains("float"), "unexpected error: {err}");
}

#[test]
fn rapid_watch_events_cause_a_single_reload() {
    let (mut host, _core, _game) = host_with(ACTOR_MODULE);
    assert_eq!(host.domain_generation(), Some(1));

    let coordinator = host.reload_coordinator();
    coordinator.notify_modified();
    coordinator.notify_modified();
    assert!(host.reload_pending());

    host.update(0.016);
    assert_eq!(host.domain_generation(), Some(2), "two notifications, one reload");
    assert!(!host.reload_pending());

    // The next notification arms a fresh reload.
    coordinator.notify_modified();
    host.update(0.016);
    assert_eq!(host.domain_generation(), Some(3));
}

#[test]
fn a_broken_module_reload_keeps_the_host_usable() {
    let (mut host, _core, game) = host_with(ACTOR_MODULE);
    assert_eq!(host.script_classes().len(), 1);

    fs::write(game.path(), "fn Actor(id) { this is not a module").expect("clobber module");
    host.reload().expect("a game-module failure is logged, not fatal");
    assert!(host.is_initialized());
    assert!(host.script_classes().is_empty(), "broken module contributes no classes");

    fs::write(game.path(), ACTOR_MODULE).expect("repair module");
    host.reload().expect("reload should succeed");
    assert_eq!(host.script_classes().len(), 1, "classes come back once the module parses");
}

#[test]
fn invalidated_instances_never_dispatch() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
            fn Actor_on_update(dt) { log("tick"); }
        "#,
    );
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Actor").expect("bind should succeed");
    host.update(0.016);
    host.take_script_logs();

    host.reload().expect("reload should succeed");
    for _ in 0..10 {
        host.update(0.016);
    }
    assert!(host.take_script_logs().is_empty(), "stale bindings must stay silent");
    assert!(host.last_error().is_none(), "invalidation is not an error");
}
