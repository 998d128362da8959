use std::io::Write;

use talon_engine::config::ScriptSettings;
use talon_engine::host::ScriptHost;
use tempfile::NamedTempFile;
use uuid::Uuid;

fn write_module(contents: &str) -> NamedTempFile {
    let mut temp = NamedTempFile::new().expect("temp module");
    write!(temp, "{contents}").expect("write module");
    temp
}

fn core_module() -> NamedTempFile {
    write_module(
        r#"
            fn Entity(id) {
                #{ "__base": "Entity", "__id": id }
            }
        "#,
    )
}

fn host_with(game: &str) -> (ScriptHost, NamedTempFile, NamedTempFile) {
    let core = core_module();
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
fn awakes_run_before_creates_before_updates() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
            fn Actor_on_awake() { log("awake"); }
            fn Actor_on_create() { log("create"); }
            fn Actor_on_update(dt) { log("update"); }
        "#,
    );
    for _ in 0..3 {
        host.bind_entity(Uuid::new_v4(), "Actor").expect("bind should succeed");
    }

    host.update(0.016);
    let logs = host.take_script_logs();
    assert_eq!(logs.len(), 9, "three instances, three phases each: {logs:?}");
    assert!(logs[..3].iter().all(|line| line == "awake"), "all awakes first: {logs:?}");
    assert!(logs[3..6].iter().all(|line| line == "create"), "then all creates: {logs:?}");
    assert!(logs[6..].iter().all(|line| line == "update"), "updates last: {logs:?}");
    assert!(host.last_error().is_none());
}

#[test]
fn classes_without_a_method_skip_it_silently() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
            fn Actor_on_create() { log("created"); }
        "#,
    );
    host.bind_entity(Uuid::new_v4(), "Actor").expect("bind should succeed");

    for _ in 0..100 {
        host.update(0.016);
    }
    let logs = host.take_script_logs();
    assert_eq!(logs, vec!["created".to_string()], "no update method means no update calls");
    assert!(host.last_error().is_none(), "a missing method is not an error");
}

#[test]
fn binding_a_live_entity_twice_is_rejected() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
        "#,
    );
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Actor").expect("first bind should succeed");
    let err = host.bind_entity(entity, "Actor").expect_err("second bind must be rejected");
    assert!(err.to_string().contains("already bound"), "unexpected error: {err}");
    assert_eq!(host.instance_count(), 1);
}

#[test]
fn unknown_classes_fail_without_breaking_others() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
            fn Actor_on_update(dt) { log("tick"); }
        "#,
    );
    let good = Uuid::new_v4();
    host.bind_entity(good, "Actor").expect("bind should succeed");
    let err = host.bind_entity(Uuid::new_v4(), "Ghost").expect_err("unknown class must fail");
    assert!(err.to_string().contains("not registered"), "unexpected error: {err}");

    host.update(0.016);
    let logs = host.take_script_logs();
    assert!(logs.contains(&"tick".to_string()), "the bound entity still runs: {logs:?}");
    assert_eq!(host.instance_count(), 1);
}

#[test]
fn unbind_dispatches_destroy() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
            fn Actor_on_destroy() { log("destroyed"); }
        "#,
    );
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Actor").expect("bind should succeed");
    host.update(0.016);

    assert!(host.unbind_entity(entity));
    assert_eq!(host.instance_count(), 0);
    let logs = host.take_script_logs();
    assert!(logs.contains(&"destroyed".to_string()), "destroy hook should run: {logs:?}");
    assert!(!host.unbind_entity(entity), "second unbind is a no-op");
}

#[test]
fn errors_inside_methods_surface_as_script_errors() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
            fn Actor_on_update(dt) { missing_helper(dt); }
        "#,
    );
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Actor").expect("bind should succeed");
    host.update(0.016);

    let error = host.last_error().expect("a failing update must be reported");
    assert_eq!(error.entity, entity);
    assert_eq!(error.method, "on_update");
    assert!(error.message.contains("missing_helper"), "unexpected message: {}", error.message);
}

#[test]
fn typed_field_arithmetic_advances_in_update() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Spinner(id) {
                let obj = Entity(id);
                obj.angle = float(0.0);
                obj.rate = float(1.5);
                obj
            }
            fn Spinner_on_update(dt) {
                this.angle = float(this.angle + this.rate * dt);
            }
        "#,
    );
    let entity = Uuid::new_v4();
    host.bind_entity(entity, "Spinner").expect("bind should succeed");
    host.update(0.5);

    assert!(host.last_error().is_none(), "update must run cleanly: {:?}", host.last_error());
    assert_eq!(host.get_field_value::<f32>(entity, "angle").expect("read angle"), 0.75);
}

#[test]
fn qualified_class_names_resolve_to_their_simple_name() {
    let (mut host, _core, _game) = host_with(
        r#"
            fn Actor(id) { Entity(id) }
        "#,
    );
    host.bind_entity(Uuid::new_v4(), "Game.Core.Actor").expect("qualified name should resolve");
    assert_eq!(host.instance_count(), 1);
}
