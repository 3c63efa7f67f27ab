//! Value kinds, their native representations, and the dynamic `Value` used at
//! API boundaries.
//!
//! Storage never tags individual elements: every kind has one fixed native
//! type, and collections keep one array per kind. `Value` only exists where a
//! caller needs to move a value across a kind-agnostic interface (apply,
//! introspection, JSON).

use std::alloc::Layout;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Closed set of value kinds a rig parameter can hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Space,
    Bool,
    Enum,
    Integer,
    Scalar,
    Vector3,
    Transform,
}

impl ValueKind {
    pub const COUNT: usize = 7;

    /// Every kind, in the fixed probe order used by name-only lookups.
    pub const ALL: [ValueKind; ValueKind::COUNT] = [
        ValueKind::Space,
        ValueKind::Bool,
        ValueKind::Enum,
        ValueKind::Integer,
        ValueKind::Scalar,
        ValueKind::Vector3,
        ValueKind::Transform,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Size and alignment of the native representation.
    pub fn layout(self) -> Layout {
        match self {
            ValueKind::Space => Layout::new::<SpaceKey>(),
            ValueKind::Bool => Layout::new::<bool>(),
            ValueKind::Enum => Layout::new::<u8>(),
            ValueKind::Integer => Layout::new::<i32>(),
            ValueKind::Scalar => Layout::new::<f32>(),
            ValueKind::Vector3 => Layout::new::<[f32; 3]>(),
            ValueKind::Transform => Layout::new::<EulerTransform>(),
        }
    }

    /// Value a freshly allocated slot of this kind starts with.
    pub fn default_value(self) -> Value {
        match self {
            ValueKind::Space => Value::Space(SpaceKey::default()),
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Enum => Value::Enum(0),
            ValueKind::Integer => Value::Integer(0),
            ValueKind::Scalar => Value::Scalar(0.0),
            ValueKind::Vector3 => Value::Vector3([0.0; 3]),
            ValueKind::Transform => Value::Transform(EulerTransform::IDENTITY),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Space => "space",
            ValueKind::Bool => "bool",
            ValueKind::Enum => "enum",
            ValueKind::Integer => "integer",
            ValueKind::Scalar => "scalar",
            ValueKind::Vector3 => "vector3",
            ValueKind::Transform => "transform",
        };
        f.write_str(s)
    }
}

/// Which space a control should be parented to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    /// The control's default parent in the hierarchy.
    #[default]
    Parent,
    /// The world-space reference.
    World,
    /// A named element of the rig.
    ControlRig,
}

/// Space-switch key: target space plus the element used for `ControlRig`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceKey {
    pub space: SpaceType,
    #[serde(default)]
    pub element: Name,
}

impl SpaceKey {
    pub fn parent() -> Self {
        Self::default()
    }

    pub fn world() -> Self {
        Self {
            space: SpaceType::World,
            element: Name::NONE,
        }
    }

    pub fn element(element: Name) -> Self {
        Self {
            space: SpaceType::ControlRig,
            element,
        }
    }
}

/// Transform with Euler rotation, as produced by per-channel curves.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EulerTransform {
    pub translation: [f32; 3],
    /// Roll, pitch, yaw in degrees.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl EulerTransform {
    pub const IDENTITY: EulerTransform = EulerTransform {
        translation: [0.0; 3],
        rotation: [0.0; 3],
        scale: [1.0; 3],
    };

    pub fn new(translation: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

impl Default for EulerTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A single value of any kind.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Value {
    Space(SpaceKey),
    Bool(bool),
    Enum(u8),
    Integer(i32),
    Scalar(f32),
    Vector3([f32; 3]),
    Transform(EulerTransform),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Space(_) => ValueKind::Space,
            Value::Bool(_) => ValueKind::Bool,
            Value::Enum(_) => ValueKind::Enum,
            Value::Integer(_) => ValueKind::Integer,
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Vector3(_) => ValueKind::Vector3,
            Value::Transform(_) => ValueKind::Transform,
        }
    }

    pub fn scalar(v: f32) -> Self {
        Value::Scalar(v)
    }

    pub fn vector3(x: f32, y: f32, z: f32) -> Self {
        Value::Vector3([x, y, z])
    }

    pub fn transform(translation: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Value::Transform(EulerTransform::new(translation, rotation, scale))
    }

    /// Write the native representation of `self` to `dst`.
    ///
    /// # Safety
    /// `dst` must be valid for writes of `self.kind().layout()` and aligned to
    /// it.
    #[inline]
    pub unsafe fn write_to(self, dst: *mut u8) {
        match self {
            Value::Space(v) => dst.cast::<SpaceKey>().write(v),
            Value::Bool(v) => dst.cast::<bool>().write(v),
            Value::Enum(v) => dst.write(v),
            Value::Integer(v) => dst.cast::<i32>().write(v),
            Value::Scalar(v) => dst.cast::<f32>().write(v),
            Value::Vector3(v) => dst.cast::<[f32; 3]>().write(v),
            Value::Transform(v) => dst.cast::<EulerTransform>().write(v),
        }
    }

    /// Read a native representation of `kind` from `src`.
    ///
    /// # Safety
    /// `src` must point to an initialized, aligned value written for `kind`.
    #[inline]
    pub unsafe fn read_from(kind: ValueKind, src: *const u8) -> Value {
        match kind {
            ValueKind::Space => Value::Space(src.cast::<SpaceKey>().read()),
            ValueKind::Bool => Value::Bool(src.cast::<bool>().read()),
            ValueKind::Enum => Value::Enum(src.read()),
            ValueKind::Integer => Value::Integer(src.cast::<i32>().read()),
            ValueKind::Scalar => Value::Scalar(src.cast::<f32>().read()),
            ValueKind::Vector3 => Value::Vector3(src.cast::<[f32; 3]>().read()),
            ValueKind::Transform => Value::Transform(src.cast::<EulerTransform>().read()),
        }
    }
}

/// Native Rust type backing one `ValueKind`.
///
/// Implemented for exactly the seven representations above; typed store
/// access checks `KIND` against the store it reads from.
pub trait NativeValue: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! native_value {
    ($ty:ty, $kind:ident) => {
        impl NativeValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            #[inline]
            fn into_value(self) -> Value {
                Value::$kind(self)
            }

            #[inline]
            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

native_value!(SpaceKey, Space);
native_value!(bool, Bool);
native_value!(u8, Enum);
native_value!(i32, Integer);
native_value!(f32, Scalar);
native_value!([f32; 3], Vector3);
native_value!(EulerTransform, Transform);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_indices_follow_probe_order() {
        for (i, kind) in ValueKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(kind.default_value().kind(), *kind);
        }
    }

    #[test]
    fn raw_transfer_preserves_value() {
        let v = Value::transform([1.0, 2.0, 3.0], [10.0, 20.0, 30.0], [1.0, 1.0, 2.0]);
        let mut slot = std::mem::MaybeUninit::<EulerTransform>::uninit();
        let read = unsafe {
            v.write_to(slot.as_mut_ptr().cast());
            Value::read_from(ValueKind::Transform, slot.as_ptr().cast())
        };
        assert_eq!(read, v);
    }

    #[test]
    fn native_conversion_rejects_other_kinds() {
        assert_eq!(f32::from_value(Value::Scalar(2.5)), Some(2.5));
        assert_eq!(f32::from_value(Value::Integer(2)), None);
        assert_eq!(<[f32; 3]>::KIND, ValueKind::Vector3);
    }

    #[test]
    fn value_json_is_tagged() {
        let v = Value::Space(SpaceKey::element(Name::new("root_ctrl")));
        let s = serde_json::to_value(v).unwrap();
        assert_eq!(s["type"], "space");
        assert_eq!(s["data"]["space"], "control_rig");
        assert_eq!(s["data"]["element"], "root_ctrl");
        let back: Value = serde_json::from_value(s).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn default_transform_is_identity() {
        assert_eq!(
            ValueKind::Transform.default_value(),
            Value::Transform(EulerTransform::IDENTITY)
        );
        let parsed: EulerTransform = serde_json::from_str(r#"{"translation":[1,0,0]}"#).unwrap();
        assert_eq!(parsed.scale, [1.0; 3]);
    }
}
