use anyhow::{anyhow, bail, Context, Result};
use rhai::Dynamic;
use uuid::Uuid;

use crate::config::ScriptSettings;
use crate::field::{FieldTypeTag, FieldValue, FieldValueBuffer};
use crate::instance::{
    Collision, EntityFieldTable, InstanceBinder, JointBreak, LifecycleEvent, RaycastHit, ScriptError,
};
use crate::marshal;
use crate::registry::{ClassDescriptor, ClassRegistry};
use crate::runtime::{ModuleKind, ScriptDomain};
use crate::watch::{MainThreadQueue, MainThreadTask, ModuleWatcher, ReloadCoordinator};

/// Owns the script runtime domain and moves it through init, reload and
/// shutdown. All methods run on the engine's update thread; the only
/// cross-thread traffic is the watcher enqueueing a reload task.
pub struct ScriptHost {
    settings: ScriptSettings,
    domain: Option<ScriptDomain>,
    registry: ClassRegistry,
    binder: InstanceBinder,
    field_table: EntityFieldTable,
    tasks: MainThreadQueue,
    coordinator: ReloadCoordinator,
    watcher: Option<ModuleWatcher>,
    scene: Option<Uuid>,
    next_generation: u64,
    core_loaded_once: bool,
}

impl ScriptHost {
    pub fn new(settings: ScriptSettings) -> Self {
        let tasks = MainThreadQueue::default();
        let coordinator = ReloadCoordinator::new(tasks.clone());
        Self {
            settings,
            domain: None,
            registry: ClassRegistry::default(),
            binder: InstanceBinder::default(),
            field_table: EntityFieldTable::default(),
            tasks,
            coordinator,
            watcher: None,
            scene: None,
            next_generation: 1,
            core_loaded_once: false,
        }
    }

    /// Creates the domain and loads both modules. A core-module failure here
    /// is fatal to the scripting subsystem; a game-module failure leaves the
    /// host usable for engine-internal reflection only.
    pub fn init(&mut self) -> Result<()> {
        if self.domain.is_some() {
            bail!("scripting runtime is already initialized");
        }
        if self.settings.enable_debugging {
            eprintln!(
                "[scripts] script debugging enabled (listener port {})",
                self.settings.debug_listener_port
            );
        }
        let mut domain = ScriptDomain::new(self.next_generation);
        self.next_generation += 1;
        domain
            .load_module(ModuleKind::Core, &self.settings.core_module)
            .context("loading the engine core module")
            .inspect_err(|err| eprintln!("[scripts] scripting disabled: {err:?}"))?;
        self.core_loaded_once = true;
        if let Err(err) = domain.load_module(ModuleKind::Game, &self.settings.game_module) {
            eprintln!("[scripts] game module unavailable, no user classes will resolve: {err:?}");
        }
        self.registry = ClassRegistry::build(&domain);
        if self.registry.base_entity().is_none() {
            eprintln!("[scripts] core module does not define the Entity base class");
        }
        self.domain = Some(domain);
        self.start_watcher();
        Ok(())
    }

    /// Replaces the domain wholesale: every handle minted before this call is
    /// invalid, every bound instance becomes `Invalidated`, and the class
    /// registry is rebuilt. Instances are not recreated here; the scene owner
    /// rebinds on next use. Module-load failures after a successful first init
    /// are logged, never fatal.
    pub fn reload(&mut self) -> Result<()> {
        if !self.core_loaded_once {
            bail!("scripting runtime was never initialized");
        }
        self.binder.invalidate_all();
        let mut domain = ScriptDomain::new(self.next_generation);
        self.next_generation += 1;
        if let Err(err) = domain.load_module(ModuleKind::Core, &self.settings.core_module) {
            eprintln!("[scripts] core module reload failed: {err:?}");
        }
        if let Err(err) = domain.load_module(ModuleKind::Game, &self.settings.game_module) {
            eprintln!("[scripts] game module reload failed: {err:?}");
        }
        self.registry = ClassRegistry::build(&domain);
        self.domain = Some(domain);
        Ok(())
    }

    /// Unbinds everything (dispatching Destroy), then releases the domain and
    /// registries. The entity field table survives; it is cleared only by an
    /// explicit scene reset.
    pub fn shutdown(&mut self) {
        if let Some(domain) = self.domain.as_mut() {
            self.binder.unbind_all(domain);
        }
        self.watcher = None;
        self.domain = None;
        self.registry = ClassRegistry::default();
        self.scene = None;
    }

    /// Sets the ambient scene used to resolve entity references.
    pub fn on_runtime_start(&mut self, scene: Uuid) {
        self.scene = Some(scene);
    }

    /// Clears the ambient scene and tears down every bound instance.
    pub fn on_runtime_stop(&mut self) {
        if let Some(domain) = self.domain.as_mut() {
            self.binder.unbind_all(domain);
        }
        self.scene = None;
    }

    pub fn scene(&self) -> Option<Uuid> {
        self.scene
    }

    /// Binds `entity` to the named script class and queues its two-phase
    /// init. Failure (unknown class, constructor error, double bind) is
    /// reported and leaves the entity without behavior; other entities are
    /// unaffected.
    pub fn bind_entity(&mut self, entity: Uuid, class_name: &str) -> Result<()> {
        let Some(domain) = self.domain.as_mut() else {
            bail!("scripting runtime is not initialized");
        };
        self.binder
            .bind(domain, &self.registry, &self.field_table, entity, class_name)
            .inspect_err(|err| eprintln!("[scripts] bind failed for entity {entity}: {err}"))
    }

    pub fn unbind_entity(&mut self, entity: Uuid) -> bool {
        match self.domain.as_mut() {
            Some(domain) => self.binder.unbind(domain, entity),
            None => false,
        }
    }

    /// Per-frame tick: drains deferred tasks, runs pending Awake/Create
    /// phases, then dispatches update to every live instance.
    pub fn update(&mut self, dt: f32) {
        self.pump();
        if let Some(domain) = self.domain.as_mut() {
            self.binder.flush_pending_init(domain);
            self.binder.update_all(domain, dt);
        }
    }

    /// Drains the main-thread task queue. A queued reload disposes the
    /// watcher, reloads the domain, clears the pending flag, and recreates
    /// the watcher on the fresh module file.
    pub fn pump(&mut self) {
        for task in self.tasks.drain() {
            match task {
                MainThreadTask::ReloadScripts => {
                    self.watcher = None;
                    match self.reload() {
                        Ok(()) => eprintln!(
                            "[scripts] hot reloaded game module {}",
                            self.settings.game_module.display()
                        ),
                        Err(err) => eprintln!("[scripts] hot reload failed: {err:?}"),
                    }
                    self.coordinator.clear_pending();
                    self.start_watcher();
                }
            }
        }
    }

    pub fn dispatch_update(&mut self, entity: Uuid, dt: f32) {
        let Some(domain) = self.domain.as_mut() else {
            return;
        };
        let prefers_delta =
            self.binder.instance(entity).is_some_and(|i| i.has_method(LifecycleEvent::UpdateDelta));
        if prefers_delta {
            self.binder.dispatch(domain, LifecycleEvent::UpdateDelta, entity, vec![Dynamic::from(dt as f64)]);
        } else {
            self.binder.dispatch(domain, LifecycleEvent::Update, entity, Vec::new());
        }
    }

    pub fn dispatch_collision_enter(&mut self, entity: Uuid, collision: Collision) {
        self.dispatch_with(entity, LifecycleEvent::CollisionEnter, vec![collision.to_dynamic()]);
    }

    pub fn dispatch_collision_exit(&mut self, entity: Uuid, collision: Collision) {
        self.dispatch_with(entity, LifecycleEvent::CollisionExit, vec![collision.to_dynamic()]);
    }

    pub fn dispatch_trigger_enter(&mut self, entity: Uuid, collision: Collision) {
        self.dispatch_with(entity, LifecycleEvent::TriggerEnter, vec![collision.to_dynamic()]);
    }

    pub fn dispatch_trigger_exit(&mut self, entity: Uuid, collision: Collision) {
        self.dispatch_with(entity, LifecycleEvent::TriggerExit, vec![collision.to_dynamic()]);
    }

    pub fn dispatch_joint_disconnected(&mut self, entity: Uuid, joint: JointBreak) {
        self.dispatch_with(entity, LifecycleEvent::JointDisconnected, vec![joint.to_dynamic()]);
    }

    pub fn dispatch_raycast_hit(&mut self, entity: Uuid, hit: RaycastHit) {
        self.dispatch_with(entity, LifecycleEvent::RaycastHit, vec![hit.to_dynamic()]);
    }

    pub fn dispatch_enabled(&mut self, entity: Uuid) {
        self.dispatch_with(entity, LifecycleEvent::Enabled, Vec::new());
    }

    pub fn dispatch_disabled(&mut self, entity: Uuid) {
        self.dispatch_with(entity, LifecycleEvent::Disabled, Vec::new());
    }

    pub fn dispatch_gui(&mut self, entity: Uuid) {
        self.dispatch_with(entity, LifecycleEvent::Gui, Vec::new());
    }

    /// Editor/inspector read. Prefers the live instance; falls back to the
    /// buffered field table when the entity is not (or no longer) bound.
    pub fn get_field_value<T>(&self, entity: Uuid, field: &str) -> Result<T>
    where
        T: TryFrom<FieldValue, Error = FieldTypeTag>,
    {
        let buffer = self.field_buffer(entity, field)?;
        T::try_from(buffer.decode()).map_err(|tag| {
            anyhow!("field '{field}' on entity {entity} holds {}, not the requested type", tag.label())
        })
    }

    /// Editor/inspector write. Always lands in the entity field table (so the
    /// value survives reload and rebind) and is pushed into the live instance
    /// when one exists.
    pub fn set_field_value<T>(&mut self, entity: Uuid, field: &str, value: T) -> Result<()>
    where
        T: Into<FieldValue>,
    {
        let buffer = FieldValueBuffer::from(value.into());
        if let Some(instance) = self.binder.instance(entity).filter(|i| i.is_live()) {
            let class = self
                .registry
                .resolve(instance.class_name())
                .ok_or_else(|| anyhow!("class '{}' vanished from the registry", instance.class_name()))?;
            let descriptor = class
                .field(field)
                .ok_or_else(|| anyhow!("class '{}' has no field '{field}'", class.name()))?;
            let object = instance.object();
            let domain = self
                .domain
                .as_mut()
                .ok_or_else(|| anyhow!("scripting runtime is not initialized"))?;
            marshal::set(domain, object, descriptor, &buffer)?;
        }
        self.field_table.set(entity, field, buffer);
        Ok(())
    }

    /// Drops every buffered field value; an explicit scene-level reset.
    pub fn reset_field_table(&mut self) {
        self.field_table.clear();
    }

    pub fn field_table_mut(&mut self) -> &mut EntityFieldTable {
        &mut self.field_table
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Discovered game script classes, for the editor's class picker.
    pub fn script_classes(&self) -> Vec<&ClassDescriptor> {
        self.registry.game_classes().collect()
    }

    /// Core-module type names with field counts, for the registry view panel.
    pub fn core_class_summaries(&self) -> Vec<(String, usize)> {
        self.registry.core_summaries()
    }

    pub fn instance_count(&self) -> usize {
        self.binder.len()
    }

    pub fn instance_state(&self, entity: Uuid) -> Option<crate::instance::BindingState> {
        self.binder.instance(entity).map(|i| i.state())
    }

    pub fn last_error(&self) -> Option<&ScriptError> {
        self.binder.last_error()
    }

    pub fn reload_pending(&self) -> bool {
        self.coordinator.reload_pending()
    }

    /// The coordinator handle given to watcher threads; exposed so tests and
    /// editor tooling can force a deferred reload.
    pub fn reload_coordinator(&self) -> ReloadCoordinator {
        self.coordinator.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.domain.is_some()
    }

    pub fn domain_generation(&self) -> Option<u64> {
        self.domain.as_ref().map(ScriptDomain::generation)
    }

    /// Log lines emitted by script code since the last call.
    pub fn take_script_logs(&mut self) -> Vec<String> {
        self.domain.as_mut().map(ScriptDomain::take_logs).unwrap_or_default()
    }

    fn dispatch_with(&mut self, entity: Uuid, event: LifecycleEvent, args: Vec<Dynamic>) {
        if let Some(domain) = self.domain.as_mut() {
            self.binder.dispatch(domain, event, entity, args);
        }
    }

    fn field_buffer(&self, entity: Uuid, field: &str) -> Result<FieldValueBuffer> {
        if let Some(instance) = self.binder.instance(entity).filter(|i| i.is_live()) {
            let class = self
                .registry
                .resolve(instance.class_name())
                .ok_or_else(|| anyhow!("class '{}' vanished from the registry", instance.class_name()))?;
            let descriptor = class
                .field(field)
                .ok_or_else(|| anyhow!("class '{}' has no field '{field}'", class.name()))?;
            let domain = self
                .domain
                .as_ref()
                .ok_or_else(|| anyhow!("scripting runtime is not initialized"))?;
            return marshal::get(domain, instance.object(), descriptor);
        }
        self.field_table
            .get(entity, field)
            .copied()
            .ok_or_else(|| anyhow!("entity {entity} has no value for field '{field}'"))
    }

    fn start_watcher(&mut self) {
        match ModuleWatcher::new(&self.settings.game_module, self.coordinator.clone()) {
            Ok(watcher) => {
                eprintln!("[scripts] watching {} for module edits", watcher.path().display());
                self.watcher = Some(watcher);
            }
            Err(err) => {
                eprintln!("[scripts] module hot-reload watcher disabled: {err:?}");
                self.watcher = None;
            }
        }
    }
}
