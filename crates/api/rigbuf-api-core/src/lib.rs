//! rigbuf-api-core: value kinds, names and rig target contracts (core, engine-agnostic)

pub mod json;
pub mod name;
pub mod target;
pub mod value;

pub use name::Name;
pub use target::{euler_to_quat, ControlType, ParentSelector, RigTarget};
pub use value::{EulerTransform, NativeValue, SpaceKey, SpaceType, Value, ValueKind};
