use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3, Vec4};
use rand::Rng;
use rhai::{CallFnOptions, Dynamic, Engine, Map, Module, Scope, AST};
use uuid::Uuid;

use crate::field::{AssetHandle, Color3, Color4, EntityRef, FieldTypeTag, FieldValue};

/// Name of the base class every script class derives from. Defined by the
/// engine core module.
pub const BASE_CLASS: &str = "Entity";

/// Prototype map key planted by the base constructor; its presence marks a
/// constructor's result as a script class instance.
const BASE_MARKER: &str = "__base";

/// Prototype map key holding the owning entity's UUID string.
const ENTITY_ID_KEY: &str = "__id";

/// Which module slot of a domain a class or method lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Core,
    Game,
}

impl ModuleKind {
    pub fn label(self) -> &'static str {
        match self {
            ModuleKind::Core => "core",
            ModuleKind::Game => "game",
        }
    }
}

/// Non-owning handle to a live script object. Valid only while the domain
/// generation that minted it is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    index: usize,
    generation: u64,
}

impl ObjectHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Resolved script method: function name + arity, stamped with the minting
/// domain generation so stale cache entries fail loudly instead of dangling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodKey {
    name: String,
    arity: usize,
    module: ModuleKind,
    generation: u64,
}

impl MethodKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// Reflection summary of one discovered script class.
#[derive(Debug, Clone)]
pub struct ReflectedClass {
    pub name: String,
    pub module: ModuleKind,
    /// Field name paired with its native type tag, unsupported types included
    /// (tagged `None`).
    pub fields: Vec<(String, FieldTypeTag)>,
}

/// One isolated execution context of the embedded runtime. Owns the engine,
/// both loaded modules, and every script object minted within it; dropping the
/// domain (or replacing it on reload) invalidates all of them at once, which
/// handle generation checks turn into reportable errors.
pub struct ScriptDomain {
    engine: Engine,
    core_ast: Option<AST>,
    game_ast: Option<AST>,
    objects: Vec<Option<Dynamic>>,
    free_slots: Vec<usize>,
    logs: Rc<RefCell<Vec<String>>>,
    generation: u64,
}

impl ScriptDomain {
    pub fn new(generation: u64) -> Self {
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        let logs = Rc::new(RefCell::new(Vec::new()));
        register_api(&mut engine, logs.clone());
        Self { engine, core_ast: None, game_ast: None, objects: Vec::new(), free_slots: Vec::new(), logs, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_module(&self, kind: ModuleKind) -> bool {
        self.module_ast(kind).is_some()
    }

    /// Compiles the module at `path` into this domain. The core module is
    /// additionally registered as a global module so game classes can call the
    /// base `Entity` constructor and any shared helpers.
    pub fn load_module(&mut self, kind: ModuleKind, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Reading {} module {}", kind.label(), path.display()))?;
        let ast = self
            .engine
            .compile(source)
            .with_context(|| format!("Compiling {} module {}", kind.label(), path.display()))?;
        match kind {
            ModuleKind::Core => {
                let module = Module::eval_ast_as_new(Scope::new(), &ast, &self.engine)
                    .map_err(|err| anyhow!(err.to_string()))
                    .with_context(|| format!("Evaluating core module {}", path.display()))?;
                self.engine.register_global_module(module.into());
                self.core_ast = Some(ast);
            }
            ModuleKind::Game => self.game_ast = Some(ast),
        }
        Ok(())
    }

    /// Enumerates script classes defined by a loaded module: every public
    /// single-parameter function with a capitalized name whose prototype
    /// carries the base-class marker.
    pub fn reflect_classes(&self, kind: ModuleKind) -> Vec<ReflectedClass> {
        let Some(ast) = self.module_ast(kind) else {
            return Vec::new();
        };
        let mut classes = Vec::new();
        for meta in ast.iter_functions() {
            // Lifecycle methods (`Class_on_update(dt)`, ...) share the
            // capitalized prefix and a single parameter; the underscore rules
            // them out so their bodies never run at reflection time.
            if meta.params.len() != 1
                || meta.name.contains('_')
                || !meta.name.chars().next().is_some_and(char::is_uppercase)
            {
                continue;
            }
            let prototype = match self.construct(kind, meta.name, Uuid::nil()) {
                Ok(value) => value,
                Err(err) => {
                    eprintln!("[scripts] skipping '{}' during reflection: {err}", meta.name);
                    continue;
                }
            };
            let Some(map) = prototype.read_lock::<Map>() else {
                continue;
            };
            let derives_base = map
                .get(BASE_MARKER)
                .and_then(|base| base.clone().into_string().ok())
                .is_some_and(|base| base == BASE_CLASS);
            if !derives_base {
                continue;
            }
            let fields = map
                .iter()
                .filter(|(key, _)| !key.starts_with("__"))
                .map(|(key, value)| (key.to_string(), classify(value)))
                .collect();
            classes.push(ReflectedClass { name: meta.name.to_string(), module: kind, fields });
        }
        classes
    }

    /// Creates a script object by invoking the class constructor with the
    /// entity's UUID, so script code can look its entity up.
    pub fn instantiate(&mut self, kind: ModuleKind, class: &str, entity: Uuid) -> Result<ObjectHandle> {
        let value = self.construct(kind, class, entity)?;
        if value.read_lock::<Map>().is_none() {
            bail!("constructor '{class}' did not return an object");
        }
        let index = match self.free_slots.pop() {
            Some(slot) => {
                self.objects[slot] = Some(value);
                slot
            }
            None => {
                self.objects.push(Some(value));
                self.objects.len() - 1
            }
        };
        Ok(ObjectHandle { index, generation: self.generation })
    }

    pub fn destroy_object(&mut self, handle: ObjectHandle) {
        if handle.generation != self.generation {
            return;
        }
        if let Some(slot) = self.objects.get_mut(handle.index) {
            if slot.take().is_some() {
                self.free_slots.push(handle.index);
            }
        }
    }

    /// Looks a script method up by name and arity. Absence is expected (a
    /// class may implement any subset of lifecycle methods), so this returns
    /// `None` rather than an error.
    pub fn resolve_method(
        &self,
        kind: ModuleKind,
        class: &str,
        method: &str,
        arity: usize,
    ) -> Option<MethodKey> {
        let ast = self.module_ast(kind)?;
        let name = format!("{class}_{method}");
        ast.iter_functions()
            .find(|meta| meta.name == name && meta.params.len() == arity)
            .map(|_| MethodKey { name, arity, module: kind, generation: self.generation })
    }

    /// Invokes a resolved method with the object bound as `this`.
    pub fn invoke(&mut self, object: ObjectHandle, method: &MethodKey, args: Vec<Dynamic>) -> Result<()> {
        self.check_generation(object.generation)?;
        self.check_generation(method.generation)?;
        let ast = match method.module {
            ModuleKind::Core => self.core_ast.as_ref(),
            ModuleKind::Game => self.game_ast.as_ref(),
        }
        .ok_or_else(|| anyhow!("{} module is not loaded", method.module.label()))?;
        let this = self
            .objects
            .get_mut(object.index)
            .and_then(Option::as_mut)
            .ok_or_else(|| anyhow!("script object was destroyed"))?;
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true).bind_this_ptr(this);
        let mut scope = Scope::new();
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, ast, &method.name, args)
            .map(|_| ())
            .map_err(|err| anyhow!("{err}"))
    }

    /// Reads one typed field out of a script object.
    pub fn get_field(&self, object: ObjectHandle, key: &str, tag: FieldTypeTag) -> Result<FieldValue> {
        self.check_generation(object.generation)?;
        let map = self
            .objects
            .get(object.index)
            .and_then(Option::as_ref)
            .and_then(|value| value.read_lock::<Map>())
            .ok_or_else(|| anyhow!("script object was destroyed"))?;
        let value = map.get(key).ok_or_else(|| anyhow!("object has no field '{key}'"))?;
        dynamic_to_value(tag, value)
            .ok_or_else(|| anyhow!("field '{key}' does not hold a {} value", tag.label()))
    }

    /// Writes one typed field into a script object.
    pub fn set_field(&mut self, object: ObjectHandle, key: &str, value: FieldValue) -> Result<()> {
        self.check_generation(object.generation)?;
        let mut map = self
            .objects
            .get_mut(object.index)
            .and_then(Option::as_mut)
            .and_then(|slot| slot.write_lock::<Map>())
            .ok_or_else(|| anyhow!("script object was destroyed"))?;
        if !map.contains_key(key) {
            bail!("object has no field '{key}'");
        }
        map.insert(key.into(), value_to_dynamic(value));
        Ok(())
    }

    /// Drains the log lines emitted by script code since the last call.
    pub fn take_logs(&mut self) -> Vec<String> {
        self.logs.borrow_mut().drain(..).collect()
    }

    fn module_ast(&self, kind: ModuleKind) -> Option<&AST> {
        match kind {
            ModuleKind::Core => self.core_ast.as_ref(),
            ModuleKind::Game => self.game_ast.as_ref(),
        }
    }

    fn construct(&self, kind: ModuleKind, class: &str, entity: Uuid) -> Result<Dynamic> {
        let ast =
            self.module_ast(kind).ok_or_else(|| anyhow!("{} module is not loaded", kind.label()))?;
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, ast, class, (entity.to_string(),))
            .map_err(|err| anyhow!("constructing '{class}': {err}"))
    }

    fn check_generation(&self, generation: u64) -> Result<()> {
        if generation != self.generation {
            bail!(
                "stale handle: minted by domain generation {generation}, current is {}",
                self.generation
            );
        }
        Ok(())
    }
}

/// Fixed script-type to tag classification used by reflection. Narrow numeric
/// field types come from the registered typed constructors (`float(..)`,
/// `short(..)`, ...) since the runtime's native numbers are only i64/f64.
pub fn classify(value: &Dynamic) -> FieldTypeTag {
    if value.is::<f32>() {
        FieldTypeTag::Float
    } else if value.is::<f64>() {
        FieldTypeTag::Double
    } else if value.is::<bool>() {
        FieldTypeTag::Bool
    } else if value.is::<char>() {
        FieldTypeTag::Char
    } else if value.is::<i16>() {
        FieldTypeTag::Short
    } else if value.is::<i32>() {
        FieldTypeTag::Int
    } else if value.is::<i64>() {
        FieldTypeTag::Long
    } else if value.is::<u8>() {
        FieldTypeTag::Byte
    } else if value.is::<u16>() {
        FieldTypeTag::UShort
    } else if value.is::<u32>() {
        FieldTypeTag::UInt
    } else if value.is::<u64>() {
        FieldTypeTag::ULong
    } else if value.is::<Vec2>() {
        FieldTypeTag::Vector2
    } else if value.is::<Vec3>() {
        FieldTypeTag::Vector3
    } else if value.is::<Vec4>() {
        FieldTypeTag::Vector4
    } else if value.is::<Color3>() {
        FieldTypeTag::Color3
    } else if value.is::<Color4>() {
        FieldTypeTag::Color4
    } else if value.is::<EntityRef>() {
        FieldTypeTag::EntityReference
    } else if value.is::<AssetHandle>() {
        FieldTypeTag::AssetHandle
    } else {
        FieldTypeTag::None
    }
}

fn dynamic_to_value(tag: FieldTypeTag, value: &Dynamic) -> Option<FieldValue> {
    let value = value.clone();
    match tag {
        FieldTypeTag::None => None,
        FieldTypeTag::Float => value.try_cast::<f32>().map(FieldValue::Float),
        FieldTypeTag::Double => value.try_cast::<f64>().map(FieldValue::Double),
        FieldTypeTag::Bool => value.try_cast::<bool>().map(FieldValue::Bool),
        FieldTypeTag::Char => value.try_cast::<char>().map(FieldValue::Char),
        FieldTypeTag::Short => value.try_cast::<i16>().map(FieldValue::Short),
        FieldTypeTag::Int => value.try_cast::<i32>().map(FieldValue::Int),
        FieldTypeTag::Long => value.try_cast::<i64>().map(FieldValue::Long),
        FieldTypeTag::Byte => value.try_cast::<u8>().map(FieldValue::Byte),
        FieldTypeTag::UShort => value.try_cast::<u16>().map(FieldValue::UShort),
        FieldTypeTag::UInt => value.try_cast::<u32>().map(FieldValue::UInt),
        FieldTypeTag::ULong => value.try_cast::<u64>().map(FieldValue::ULong),
        FieldTypeTag::Vector2 => value.try_cast::<Vec2>().map(FieldValue::Vector2),
        FieldTypeTag::Vector3 => value.try_cast::<Vec3>().map(FieldValue::Vector3),
        FieldTypeTag::Vector4 => value.try_cast::<Vec4>().map(FieldValue::Vector4),
        FieldTypeTag::Color3 => value.try_cast::<Color3>().map(FieldValue::Color3),
        FieldTypeTag::Color4 => value.try_cast::<Color4>().map(FieldValue::Color4),
        FieldTypeTag::EntityReference => value.try_cast::<EntityRef>().map(FieldValue::Entity),
        FieldTypeTag::AssetHandle => value.try_cast::<AssetHandle>().map(FieldValue::Asset),
    }
}

fn value_to_dynamic(value: FieldValue) -> Dynamic {
    match value {
        FieldValue::Float(v) => Dynamic::from(v),
        FieldValue::Double(v) => Dynamic::from(v),
        FieldValue::Bool(v) => Dynamic::from(v),
        FieldValue::Char(v) => Dynamic::from(v),
        FieldValue::Short(v) => Dynamic::from(v),
        FieldValue::Int(v) => Dynamic::from(v),
        FieldValue::Long(v) => Dynamic::from(v),
        FieldValue::Byte(v) => Dynamic::from(v),
        FieldValue::UShort(v) => Dynamic::from(v),
        FieldValue::UInt(v) => Dynamic::from(v),
        FieldValue::ULong(v) => Dynamic::from(v),
        FieldValue::Vector2(v) => Dynamic::from(v),
        FieldValue::Vector3(v) => Dynamic::from(v),
        FieldValue::Vector4(v) => Dynamic::from(v),
        FieldValue::Color3(v) => Dynamic::from(v),
        FieldValue::Color4(v) => Dynamic::from(v),
        FieldValue::Entity(v) => Dynamic::from(v),
        FieldValue::Asset(v) => Dynamic::from(v),
    }
}

fn register_api(engine: &mut Engine, logs: Rc<RefCell<Vec<String>>>) {
    engine.register_type_with_name::<Vec2>("Vec2");
    engine.register_type_with_name::<Vec3>("Vec3");
    engine.register_type_with_name::<Vec4>("Vec4");
    engine.register_type_with_name::<Color3>("Color3");
    engine.register_type_with_name::<Color4>("Color4");
    engine.register_type_with_name::<EntityRef>("EntityRef");
    engine.register_type_with_name::<AssetHandle>("AssetHandle");

    engine.register_fn("log", move |message: &str| {
        logs.borrow_mut().push(message.to_string());
        println!("[script] {message}");
    });
    engine.register_fn("rand", |min: f64, max: f64| {
        let mut rng = rand::thread_rng();
        rng.gen_range(min..max)
    });

    // The narrowed numeric field types are foreign to the runtime, so the
    // operators scripts mix them into (with each other and with the native
    // f64/i64 numbers) have to be registered explicitly.
    engine.register_fn("+", |a: f32, b: f32| a + b);
    engine.register_fn("-", |a: f32, b: f32| a - b);
    engine.register_fn("*", |a: f32, b: f32| a * b);
    engine.register_fn("/", |a: f32, b: f32| a / b);
    engine.register_fn("+", |a: f32, b: f64| a as f64 + b);
    engine.register_fn("-", |a: f32, b: f64| a as f64 - b);
    engine.register_fn("*", |a: f32, b: f64| a as f64 * b);
    engine.register_fn("/", |a: f32, b: f64| a as f64 / b);
    engine.register_fn("+", |a: f64, b: f32| a + b as f64);
    engine.register_fn("-", |a: f64, b: f32| a - b as f64);
    engine.register_fn("*", |a: f64, b: f32| a * b as f64);
    engine.register_fn("/", |a: f64, b: f32| a / b as f64);
    engine.register_fn("-", |v: f32| -v);
    engine.register_fn("==", |a: f32, b: f32| a == b);
    engine.register_fn("!=", |a: f32, b: f32| a != b);
    engine.register_fn("<", |a: f32, b: f32| a < b);
    engine.register_fn("<=", |a: f32, b: f32| a <= b);
    engine.register_fn(">", |a: f32, b: f32| a > b);
    engine.register_fn(">=", |a: f32, b: f32| a >= b);
    engine.register_fn("+", |a: i32, b: i32| a + b);
    engine.register_fn("-", |a: i32, b: i32| a - b);
    engine.register_fn("*", |a: i32, b: i32| a * b);
    engine.register_fn("+", |a: i32, b: i64| a as i64 + b);
    engine.register_fn("+", |a: i64, b: i32| a + b as i64);
    engine.register_fn("-", |a: i32, b: i64| a as i64 - b);
    engine.register_fn("-", |a: i64, b: i32| a - b as i64);
    engine.register_fn("==", |a: i32, b: i64| a as i64 == b);

    engine.register_fn("+", |a: Vec2, b: Vec2| a + b);
    engine.register_fn("-", |a: Vec2, b: Vec2| a - b);
    engine.register_fn("*", |a: Vec2, s: f64| a * s as f32);
    engine.register_fn("*", |s: f64, a: Vec2| a * s as f32);
    engine.register_fn("+", |a: Vec3, b: Vec3| a + b);
    engine.register_fn("-", |a: Vec3, b: Vec3| a - b);
    engine.register_fn("*", |a: Vec3, s: f64| a * s as f32);
    engine.register_fn("*", |s: f64, a: Vec3| a * s as f32);
    engine.register_fn("+", |a: Vec4, b: Vec4| a + b);
    engine.register_fn("-", |a: Vec4, b: Vec4| a - b);
    engine.register_fn("*", |a: Vec4, s: f64| a * s as f32);
    engine.register_fn("*", |s: f64, a: Vec4| a * s as f32);

    // Component access; scripts see f64 on both sides.
    engine.register_get_set("x", |v: &mut Vec2| v.x as f64, |v: &mut Vec2, x: f64| v.x = x as f32);
    engine.register_get_set("y", |v: &mut Vec2| v.y as f64, |v: &mut Vec2, y: f64| v.y = y as f32);
    engine.register_get_set("x", |v: &mut Vec3| v.x as f64, |v: &mut Vec3, x: f64| v.x = x as f32);
    engine.register_get_set("y", |v: &mut Vec3| v.y as f64, |v: &mut Vec3, y: f64| v.y = y as f32);
    engine.register_get_set("z", |v: &mut Vec3| v.z as f64, |v: &mut Vec3, z: f64| v.z = z as f32);
    engine.register_get_set("x", |v: &mut Vec4| v.x as f64, |v: &mut Vec4, x: f64| v.x = x as f32);
    engine.register_get_set("y", |v: &mut Vec4| v.y as f64, |v: &mut Vec4, y: f64| v.y = y as f32);
    engine.register_get_set("z", |v: &mut Vec4| v.z as f64, |v: &mut Vec4, z: f64| v.z = z as f32);
    engine.register_get_set("w", |v: &mut Vec4| v.w as f64, |v: &mut Vec4, w: f64| v.w = w as f32);
    engine.register_get_set("r", |c: &mut Color3| c.r as f64, |c: &mut Color3, r: f64| c.r = r as f32);
    engine.register_get_set("g", |c: &mut Color3| c.g as f64, |c: &mut Color3, g: f64| c.g = g as f32);
    engine.register_get_set("b", |c: &mut Color3| c.b as f64, |c: &mut Color3, b: f64| c.b = b as f32);
    engine.register_get_set("r", |c: &mut Color4| c.r as f64, |c: &mut Color4, r: f64| c.r = r as f32);
    engine.register_get_set("g", |c: &mut Color4| c.g as f64, |c: &mut Color4, g: f64| c.g = g as f32);
    engine.register_get_set("b", |c: &mut Color4| c.b as f64, |c: &mut Color4, b: f64| c.b = b as f32);
    engine.register_get_set("a", |c: &mut Color4| c.a as f64, |c: &mut Color4, a: f64| c.a = a as f32);

    engine.register_fn("to_string", |v: f32| v.to_string());
    engine.register_fn("to_string", |v: i32| v.to_string());
    engine.register_fn("to_string", |v: Vec2| v.to_string());
    engine.register_fn("to_string", |v: Vec3| v.to_string());
    engine.register_fn("to_string", |v: Vec4| v.to_string());
    engine.register_fn("to_string", |c: Color3| format!("rgb({}, {}, {})", c.r, c.g, c.b));
    engine.register_fn("to_string", |c: Color4| {
        format!("rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a)
    });
    engine.register_fn("to_string", |e: EntityRef| e.0.to_string());
    engine.register_fn("==", |a: EntityRef, b: EntityRef| a == b);
    engine.register_fn("!=", |a: EntityRef, b: EntityRef| a != b);

    // Typed field constructors: narrow the runtime's native i64/f64 numbers so
    // reflection can tag fields precisely.
    engine.register_fn("float", |v: f64| v as f32);
    engine.register_fn("short", |v: i64| v as i16);
    engine.register_fn("int", |v: i64| v as i32);
    engine.register_fn("byte", |v: i64| v as u8);
    engine.register_fn("ushort", |v: i64| v as u16);
    engine.register_fn("uint", |v: i64| v as u32);
    engine.register_fn("ulong", |v: i64| v as u64);

    engine.register_fn("vec2", |x: f64, y: f64| Vec2::new(x as f32, y as f32));
    engine.register_fn("vec3", |x: f64, y: f64, z: f64| Vec3::new(x as f32, y as f32, z as f32));
    engine.register_fn("vec4", |x: f64, y: f64, z: f64, w: f64| {
        Vec4::new(x as f32, y as f32, z as f32, w as f32)
    });
    engine.register_fn("rgb", |r: f64, g: f64, b: f64| Color3::new(r as f32, g as f32, b as f32));
    engine.register_fn("rgba", |r: f64, g: f64, b: f64, a: f64| {
        Color4::new(r as f32, g as f32, b as f32, a as f32)
    });
    engine.register_fn("entity_ref", |id: &str| {
        EntityRef(Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil()))
    });
    engine.register_fn("asset_handle", |id: i64| AssetHandle(id as u64));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_module(contents: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().expect("temp module");
        write!(temp, "{contents}").expect("write module");
        temp
    }

    fn core_source() -> &'static str {
        r#"
            fn Entity(id) {
                #{ "__base": "Entity", "__id": id }
            }
        "#
    }

    fn domain_with(game: &str) -> (ScriptDomain, NamedTempFile, NamedTempFile) {
        let core = write_module(core_source());
        let module = write_module(game);
        let mut domain = ScriptDomain::new(1);
        domain.load_module(ModuleKind::Core, core.path()).expect("core module should load");
        domain.load_module(ModuleKind::Game, module.path()).expect("game module should load");
        (domain, core, module)
    }

    #[test]
    fn reflection_finds_classes_and_tags_fields() {
        let (domain, _core, _game) = domain_with(
            r#"
                fn Player(id) {
                    let obj = Entity(id);
                    obj.speed = float(7.5);
                    obj.lives = int(3);
                    obj.title = "hero";
                    obj
                }

                fn helper(x) { x }
            "#,
        );
        let classes = domain.reflect_classes(ModuleKind::Game);
        assert_eq!(classes.len(), 1, "helper() must not reflect as a class");
        let player = &classes[0];
        assert_eq!(player.name, "Player");
        let tag_of = |name: &str| {
            player.fields.iter().find(|(field, _)| field == name).map(|(_, tag)| *tag)
        };
        assert_eq!(tag_of("speed"), Some(FieldTypeTag::Float));
        assert_eq!(tag_of("lives"), Some(FieldTypeTag::Int));
        assert_eq!(tag_of("title"), Some(FieldTypeTag::None), "strings are retained but unsupported");
    }

    #[test]
    fn stale_handles_are_rejected_not_dereferenced() {
        let (mut domain, _core, _game) = domain_with(
            r#"
                fn Player(id) {
                    let obj = Entity(id);
                    obj.speed = float(1.0);
                    obj
                }
            "#,
        );
        let object =
            domain.instantiate(ModuleKind::Game, "Player", Uuid::new_v4()).expect("instantiate");
        let mut next = ScriptDomain::new(domain.generation() + 1);
        let err = next
            .get_field(object, "speed", FieldTypeTag::Float)
            .expect_err("stale handle must error");
        assert!(err.to_string().contains("stale handle"), "unexpected error: {err}");
    }

    #[test]
    fn lifecycle_methods_are_not_constructor_candidates() {
        let (mut domain, _core, _game) = domain_with(
            r#"
                fn Actor(id) { Entity(id) }
                fn Actor_on_update(dt) { log("ran"); }
            "#,
        );
        let classes = domain.reflect_classes(ModuleKind::Game);
        assert_eq!(classes.len(), 1, "only the constructor reflects: {classes:?}");
        assert_eq!(classes[0].name, "Actor");
        assert!(domain.take_logs().is_empty(), "reflection must not execute method bodies");
    }

    #[test]
    fn method_resolution_distinguishes_arity() {
        let (domain, _core, _game) = domain_with(
            r#"
                fn Player(id) { Entity(id) }
                fn Player_on_update(dt) { }
            "#,
        );
        assert!(domain.resolve_method(ModuleKind::Game, "Player", "on_update", 1).is_some());
        assert!(domain.resolve_method(ModuleKind::Game, "Player", "on_update", 0).is_none());
        assert!(domain.resolve_method(ModuleKind::Game, "Player", "on_create", 0).is_none());
    }
}
