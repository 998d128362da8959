use std::collections::BTreeMap;

use crate::field::FieldTypeTag;
use crate::runtime::{ModuleKind, ReflectedClass, ScriptDomain, BASE_CLASS};

/// One exposed field of a script class.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    tag: FieldTypeTag,
    /// Opaque backend reflection handle for this field (the object-map key).
    key: String,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> FieldTypeTag {
        self.tag
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

/// Native-side reflection summary of one script class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    module: ModuleKind,
    fields: BTreeMap<String, FieldDescriptor>,
}

impl ClassDescriptor {
    fn from_reflected(class: ReflectedClass) -> Self {
        let fields = class
            .fields
            .into_iter()
            .map(|(name, tag)| {
                (name.clone(), FieldDescriptor { key: name.clone(), name, tag })
            })
            .collect();
        Self { name: class.name, module: class.module, fields }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> ModuleKind {
        self.module
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Every script class discovered in the current domain. Rebuilt wholesale on
/// each load/reload; descriptors from an older domain must not be kept across
/// a rebuild.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    game: BTreeMap<String, ClassDescriptor>,
    core: BTreeMap<String, ClassDescriptor>,
}

impl ClassRegistry {
    pub fn build(domain: &ScriptDomain) -> Self {
        let mut registry = Self::default();
        for class in domain.reflect_classes(ModuleKind::Core) {
            let descriptor = ClassDescriptor::from_reflected(class);
            registry.core.insert(descriptor.name.clone(), descriptor);
        }
        for class in domain.reflect_classes(ModuleKind::Game) {
            let descriptor = ClassDescriptor::from_reflected(class);
            registry.game.insert(descriptor.name.clone(), descriptor);
        }
        registry
    }

    /// Resolves a component's class name. Accepts either the bare class name
    /// or a dot-qualified one (`Game.Player`), matching its trailing segment.
    pub fn resolve(&self, name: &str) -> Option<&ClassDescriptor> {
        if let Some(descriptor) = self.game.get(name) {
            return Some(descriptor);
        }
        let bare = name.rsplit('.').next()?;
        self.game.get(bare)
    }

    /// The engine base class every script instance is constructed from.
    pub fn base_entity(&self) -> Option<&ClassDescriptor> {
        self.core.get(BASE_CLASS)
    }

    pub fn game_classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.game.values()
    }

    /// Core-module type names with field counts, for the registry view panel.
    pub fn core_summaries(&self) -> Vec<(String, usize)> {
        self.core.values().map(|class| (class.name.clone(), class.field_count())).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.game.is_empty()
    }
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

    fn build_registry(game: &str) -> ClassRegistry {
        let core = write_module(
            r#"
                fn Entity(id) {
                    #{ "__base": "Entity", "__id": id }
                }
            "#,
        );
        let module = write_module(game);
        let mut domain = ScriptDomain::new(1);
        domain.load_module(ModuleKind::Core, core.path()).expect("core module should load");
        domain.load_module(ModuleKind::Game, module.path()).expect("game module should load");
        ClassRegistry::build(&domain)
    }

    #[test]
    fn resolve_accepts_qualified_names() {
        let registry = build_registry(
            r#"
                fn Player(id) {
                    let obj = Entity(id);
                    obj.speed = float(7.5);
                    obj
                }
            "#,
        );
        assert!(registry.resolve("Player").is_some());
        assert!(registry.resolve("Game.Player").is_some());
        assert!(registry.resolve("Game.Enemy").is_none());
    }

    #[test]
    fn base_entity_comes_from_the_core_module() {
        let registry = build_registry("fn Player(id) { Entity(id) }");
        let base = registry.base_entity().expect("core module defines Entity");
        assert_eq!(base.name(), BASE_CLASS);
        assert_eq!(base.field_count(), 0, "reserved __ fields must not be exposed");
        assert_eq!(registry.core_summaries(), vec![("Entity".to_string(), 0)]);
    }
}
