use anyhow::Result;
use uuid::Uuid;

use talon_engine::cli::HarnessOptions;
use talon_engine::config::ScriptSettings;
use talon_engine::host::ScriptHost;
use talon_engine::time::FrameClock;

/// Headless script harness: loads the project's script settings, binds one
/// entity per discovered game class, and runs the update loop. Editing the
/// game module while it runs exercises the deferred hot-reload path.
fn main() -> Result<()> {
    let options = HarnessOptions::from_env()?;
    let mut settings = match &options.settings {
        Some(path) => ScriptSettings::load(path)?,
        None => ScriptSettings::load_or_default("assets/script_settings.json"),
    };
    if let Some(debug) = options.debug {
        settings.enable_debugging = debug;
    }

    let mut host = ScriptHost::new(settings);
    host.init()?;
    host.on_runtime_start(Uuid::new_v4());

    let classes: Vec<String> =
        host.script_classes().iter().map(|class| class.name().to_string()).collect();
    if classes.is_empty() {
        eprintln!("[harness] game module defines no script classes");
    }
    for class in &classes {
        let entity = Uuid::new_v4();
        if host.bind_entity(entity, class).is_ok() {
            println!("[harness] bound {class} to entity {entity}");
        }
    }

    let mut clock = FrameClock::new();
    for _ in 0..options.frames {
        host.update(clock.tick());
        for line in host.take_script_logs() {
            println!("[harness] {line}");
        }
        std::thread::sleep(std::time::Duration::from_millis(16));
    }

    host.on_runtime_stop();
    host.shutdown();
    Ok(())
}
