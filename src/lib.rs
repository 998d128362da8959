pub mod cli;
pub mod config;
pub mod field;
pub mod host;
pub mod instance;
pub mod marshal;
pub mod registry;
pub mod runtime;
pub mod time;
pub mod watch;

pub use config::ScriptSettings;
pub use field::{AssetHandle, Color3, Color4, EntityRef, FieldTypeTag, FieldValue, FieldValueBuffer};
pub use host::ScriptHost;
pub use instance::{BindingState, Collision, JointBreak, LifecycleEvent, RaycastHit, ScriptError};
