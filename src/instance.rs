use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};
use glam::Vec2;
use rhai::{Dynamic, Map};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::field::{EntityRef, FieldValueBuffer};
use crate::marshal;
use crate::registry::ClassRegistry;
use crate::runtime::{MethodKey, ObjectHandle, ScriptDomain};

/// Lifecycle hooks a script class may implement. Each maps to a method name
/// and arity; absence of the method is expected, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Awake,
    Create,
    /// Per-frame update taking the frame delta. Preferred over [`Update`]
    /// when both are defined.
    ///
    /// [`Update`]: LifecycleEvent::Update
    UpdateDelta,
    Update,
    Destroy,
    CollisionEnter,
    CollisionExit,
    TriggerEnter,
    TriggerExit,
    JointDisconnected,
    RaycastHit,
    Enabled,
    Disabled,
    Gui,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 14] = [
        LifecycleEvent::Awake,
        LifecycleEvent::Create,
        LifecycleEvent::UpdateDelta,
        LifecycleEvent::Update,
        LifecycleEvent::Destroy,
        LifecycleEvent::CollisionEnter,
        LifecycleEvent::CollisionExit,
        LifecycleEvent::TriggerEnter,
        LifecycleEvent::TriggerExit,
        LifecycleEvent::JointDisconnected,
        LifecycleEvent::RaycastHit,
        LifecycleEvent::Enabled,
        LifecycleEvent::Disabled,
        LifecycleEvent::Gui,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            LifecycleEvent::Awake => "on_awake",
            LifecycleEvent::Create => "on_create",
            LifecycleEvent::UpdateDelta | LifecycleEvent::Update => "on_update",
            LifecycleEvent::Destroy => "on_destroy",
            LifecycleEvent::CollisionEnter => "on_collision_enter",
            LifecycleEvent::CollisionExit => "on_collision_exit",
            LifecycleEvent::TriggerEnter => "on_trigger_enter",
            LifecycleEvent::TriggerExit => "on_trigger_exit",
            LifecycleEvent::JointDisconnected => "on_joint_disconnected",
            LifecycleEvent::RaycastHit => "on_raycast_hit",
            LifecycleEvent::Enabled => "on_enabled",
            LifecycleEvent::Disabled => "on_disabled",
            LifecycleEvent::Gui => "on_gui",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            LifecycleEvent::UpdateDelta
            | LifecycleEvent::CollisionEnter
            | LifecycleEvent::CollisionExit
            | LifecycleEvent::TriggerEnter
            | LifecycleEvent::TriggerExit
            | LifecycleEvent::JointDisconnected
            | LifecycleEvent::RaycastHit => 1,
            _ => 0,
        }
    }
}

/// Contact payload for collision and trigger events.
#[derive(Debug, Clone, Copy)]
pub struct Collision {
    pub a: EntityRef,
    pub b: EntityRef,
    pub contact_normal: Vec2,
    pub impulse: f32,
}

impl Collision {
    pub(crate) fn to_dynamic(self) -> Dynamic {
        let mut map = Map::new();
        map.insert("a".into(), Dynamic::from(self.a));
        map.insert("b".into(), Dynamic::from(self.b));
        map.insert("normal".into(), Dynamic::from(self.contact_normal));
        map.insert("impulse".into(), Dynamic::from(self.impulse as f64));
        Dynamic::from_map(map)
    }
}

/// Payload for raycast callbacks.
#[derive(Debug, Clone, Copy)]
pub struct RaycastHit {
    pub entity: EntityRef,
    pub point: Vec2,
}

impl RaycastHit {
    pub(crate) fn to_dynamic(self) -> Dynamic {
        let mut map = Map::new();
        map.insert("entity".into(), Dynamic::from(self.entity));
        map.insert("point".into(), Dynamic::from(self.point));
        Dynamic::from_map(map)
    }
}

/// Payload for a broken physics joint.
#[derive(Debug, Clone, Copy)]
pub struct JointBreak {
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
}

impl JointBreak {
    pub(crate) fn to_dynamic(self) -> Dynamic {
        let mut map = Map::new();
        map.insert("anchor_a".into(), Dynamic::from(self.anchor_a));
        map.insert("anchor_b".into(), Dynamic::from(self.anchor_b));
        Dynamic::from_map(map)
    }
}

/// A script error raised inside a dispatched call, tied back to the entity and
/// method it came from. Logged and retained; never propagated across the
/// native boundary.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub entity: Uuid,
    pub method: String,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script error in {} for entity {}: {}", self.method, self.entity, self.message)
    }
}

/// Whether an instance's handles are still backed by the current domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Live,
    /// The owning domain was replaced by a reload. Dispatch is a no-op; the
    /// scene owner is expected to rebind.
    Invalidated,
}

/// Binds one entity to one script object and its resolved lifecycle methods.
pub struct ScriptInstance {
    entity: Uuid,
    class_name: String,
    object: ObjectHandle,
    state: BindingState,
    methods: HashMap<LifecycleEvent, MethodKey>,
}

impl ScriptInstance {
    pub fn entity(&self) -> Uuid {
        self.entity
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == BindingState::Live
    }

    pub(crate) fn object(&self) -> ObjectHandle {
        self.object
    }

    pub fn has_method(&self, event: LifecycleEvent) -> bool {
        self.methods.contains_key(&event)
    }
}

/// Field values authored before an instance exists (editor, deserializer) or
/// kept across domain teardown. Survives reload; cleared only by an explicit
/// scene reset.
#[derive(Debug, Default)]
pub struct EntityFieldTable {
    values: HashMap<Uuid, HashMap<String, FieldValueBuffer>>,
}

impl EntityFieldTable {
    pub fn set(&mut self, entity: Uuid, field: impl Into<String>, buffer: FieldValueBuffer) {
        self.values.entry(entity).or_default().insert(field.into(), buffer);
    }

    pub fn get(&self, entity: Uuid, field: &str) -> Option<&FieldValueBuffer> {
        self.values.get(&entity)?.get(field)
    }

    pub fn fields(&self, entity: Uuid) -> Option<&HashMap<String, FieldValueBuffer>> {
        self.values.get(&entity)
    }

    pub fn clear_entity(&mut self, entity: Uuid) {
        self.values.remove(&entity);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Creates, dispatches to, and tears down script instances. Newly bound
/// instances go through a two-phase init: every Awake of a frame runs before
/// any Create, and every Create before the first Update.
#[derive(Default)]
pub struct InstanceBinder {
    instances: HashMap<Uuid, ScriptInstance>,
    pending_init: SmallVec<[Uuid; 8]>,
    last_error: Option<ScriptError>,
}

impl InstanceBinder {
    /// Binds `entity` to a new instance of `class_name`. Rejects a second bind
    /// of a live instance; an invalidated binding (after reload) is replaced.
    pub fn bind(
        &mut self,
        domain: &mut ScriptDomain,
        registry: &ClassRegistry,
        field_table: &EntityFieldTable,
        entity: Uuid,
        class_name: &str,
    ) -> Result<()> {
        if self.instances.get(&entity).is_some_and(ScriptInstance::is_live) {
            bail!("entity {entity} is already bound");
        }
        let class = registry
            .resolve(class_name)
            .ok_or_else(|| anyhow::anyhow!("script class '{class_name}' is not registered"))?;
        let object = domain.instantiate(class.module(), class.name(), entity)?;

        let mut methods = HashMap::new();
        for event in LifecycleEvent::ALL {
            if let Some(key) =
                domain.resolve_method(class.module(), class.name(), event.method_name(), event.arity())
            {
                methods.insert(event, key);
            }
        }

        // Restore editor-authored values. Names with no matching descriptor
        // and tag mismatches are dropped, not errors.
        if let Some(buffered) = field_table.fields(entity) {
            for (name, buffer) in buffered {
                let Some(field) = class.field(name) else {
                    continue;
                };
                if field.tag() != buffer.tag() {
                    continue;
                }
                if let Err(err) = marshal::set(domain, object, field, buffer) {
                    eprintln!("[scripts] failed to restore field '{name}' on {entity}: {err}");
                }
            }
        }

        let instance = ScriptInstance {
            entity,
            class_name: class.name().to_string(),
            object,
            state: BindingState::Live,
            methods,
        };
        self.instances.insert(entity, instance);
        self.pending_init.push(entity);
        Ok(())
    }

    /// Dispatches Destroy (if implemented) and drops the instance.
    pub fn unbind(&mut self, domain: &mut ScriptDomain, entity: Uuid) -> bool {
        let Some(instance) = self.instances.remove(&entity) else {
            return false;
        };
        if instance.is_live() {
            self.invoke(domain, &instance, LifecycleEvent::Destroy, Vec::new());
            domain.destroy_object(instance.object());
        }
        self.pending_init.retain(|pending| *pending != entity);
        true
    }

    /// Runs the two-phase init for instances bound since the last flush.
    pub fn flush_pending_init(&mut self, domain: &mut ScriptDomain) {
        let batch: SmallVec<[Uuid; 8]> = std::mem::take(&mut self.pending_init);
        for phase in [LifecycleEvent::Awake, LifecycleEvent::Create] {
            for entity in &batch {
                self.dispatch(domain, phase, *entity, Vec::new());
            }
        }
    }

    /// Invokes the cached handle for `event` on `entity`. A missing instance,
    /// an invalidated binding, or an unimplemented method are all no-ops.
    pub fn dispatch(&mut self, domain: &mut ScriptDomain, event: LifecycleEvent, entity: Uuid, args: Vec<Dynamic>) {
        let Some(instance) = self.instances.get(&entity) else {
            return;
        };
        if !instance.is_live() {
            return;
        }
        // The map is not mutated while the borrow is held; clone the bits the
        // invoke path needs.
        let instance = ScriptInstanceView {
            entity: instance.entity,
            object: instance.object,
            method: instance.methods.get(&event).cloned(),
        };
        self.invoke_view(domain, &instance, event, args);
    }

    /// Per-frame update for every live instance: the delta variant when the
    /// class defines it, else the zero-argument variant, else nothing.
    pub fn update_all(&mut self, domain: &mut ScriptDomain, dt: f32) {
        let entities: Vec<Uuid> = self.instances.keys().copied().collect();
        for entity in entities {
            let Some(instance) = self.instances.get(&entity) else {
                continue;
            };
            if !instance.is_live() {
                continue;
            }
            if instance.has_method(LifecycleEvent::UpdateDelta) {
                self.dispatch(domain, LifecycleEvent::UpdateDelta, entity, vec![Dynamic::from(dt as f64)]);
            } else {
                self.dispatch(domain, LifecycleEvent::Update, entity, Vec::new());
            }
        }
    }

    /// Marks every binding stale after a domain replacement. No callbacks run;
    /// the scene owner rebinds on next use.
    pub fn invalidate_all(&mut self) {
        for instance in self.instances.values_mut() {
            instance.state = BindingState::Invalidated;
        }
        self.pending_init.clear();
    }

    /// Destroys every live instance, dispatching Destroy first.
    pub fn unbind_all(&mut self, domain: &mut ScriptDomain) {
        let entities: Vec<Uuid> = self.instances.keys().copied().collect();
        for entity in entities {
            self.unbind(domain, entity);
        }
    }

    pub fn instance(&self, entity: Uuid) -> Option<&ScriptInstance> {
        self.instances.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn last_error(&self) -> Option<&ScriptError> {
        self.last_error.as_ref()
    }

    fn invoke(&mut self, domain: &mut ScriptDomain, instance: &ScriptInstance, event: LifecycleEvent, args: Vec<Dynamic>) {
        let view = ScriptInstanceView {
            entity: instance.entity,
            object: instance.object,
            method: instance.methods.get(&event).cloned(),
        };
        self.invoke_view(domain, &view, event, args);
    }

    fn invoke_view(&mut self, domain: &mut ScriptDomain, view: &ScriptInstanceView, event: LifecycleEvent, args: Vec<Dynamic>) {
        let Some(method) = &view.method else {
            return;
        };
        if let Err(err) = domain.invoke(view.object, method, args) {
            let error = ScriptError {
                entity: view.entity,
                method: event.method_name().to_string(),
                message: err.to_string(),
            };
            eprintln!("[scripts] {error}");
            self.last_error = Some(error);
        }
    }
}

struct ScriptInstanceView {
    entity: Uuid,
    object: ObjectHandle,
    method: Option<MethodKey>,
}
