//! Capability interface a rig must expose to receive accumulated values.
//!
//! Everything else about the rig (its hierarchy, skeleton, element graph) is
//! opaque to the accumulation core. Adapters implement [`RigTarget`] on top of
//! the host's rig object.

use serde::{Deserialize, Serialize};

use crate::name::Name;
use crate::value::{SpaceKey, SpaceType, Value, ValueKind};

/// Control types a rig may report for a named control. Only used to
/// disambiguate how a vector value is interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Bool,
    Enum,
    Integer,
    Float,
    Position,
    Scale,
    Rotator,
    Transform,
    TransformNoScale,
    EulerTransform,
}

impl ControlType {
    /// Value kind an accumulated channel uses for this control type.
    pub fn value_kind(self) -> ValueKind {
        match self {
            ControlType::Bool => ValueKind::Bool,
            ControlType::Enum => ValueKind::Enum,
            ControlType::Integer => ValueKind::Integer,
            ControlType::Float => ValueKind::Scalar,
            ControlType::Position | ControlType::Scale | ControlType::Rotator => {
                ValueKind::Vector3
            }
            ControlType::Transform | ControlType::TransformNoScale | ControlType::EulerTransform => {
                ValueKind::Transform
            }
        }
    }
}

/// Resolved parent for a space switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentSelector {
    Default,
    World,
    Element(Name),
}

impl From<SpaceKey> for ParentSelector {
    fn from(key: SpaceKey) -> Self {
        match key.space {
            SpaceType::Parent => ParentSelector::Default,
            SpaceType::World => ParentSelector::World,
            SpaceType::ControlRig => ParentSelector::Element(key.element),
        }
    }
}

/// A rig (or rig-like object) that accumulated values are applied to.
pub trait RigTarget {
    /// Push a value onto the named control. The kind is `value.kind()`.
    fn set_named_value(&mut self, name: Name, value: Value);

    /// Re-parent `element` to the selected space.
    fn switch_parent(&mut self, element: Name, parent: ParentSelector);

    /// Control type of `name`, if the rig knows the control.
    fn control_type(&self, _name: Name) -> Option<ControlType> {
        None
    }

    /// Record the Euler angles (roll, pitch, yaw in degrees) that were
    /// actually specified for a rotation-bearing control.
    fn set_specified_euler(&mut self, _name: Name, _euler: [f32; 3]) {}

    /// Quaternion `(x, y, z, w)` for `euler` using the control's rotation
    /// order. Rigs with per-control rotation orders override this.
    fn control_quaternion(&self, _name: Name, euler: [f32; 3]) -> [f32; 4] {
        euler_to_quat(euler)
    }

    /// Push a rotation derived from the specified Euler angles.
    fn set_rotation(&mut self, _name: Name, _rotation: [f32; 4]) {}

    /// Current value of `name` as `kind`, used for pre-animated snapshots.
    fn current_value(&self, _name: Name, _kind: ValueKind) -> Option<Value> {
        None
    }
}

/// Convert roll/pitch/yaw degrees (X, Y, Z; applied yaw-pitch-roll) into a
/// unit quaternion `(x, y, z, w)`.
pub fn euler_to_quat(euler: [f32; 3]) -> [f32; 4] {
    let [roll, pitch, yaw] = euler;
    let (sr, cr) = (roll.to_radians() * 0.5).sin_cos();
    let (sp, cp) = (pitch.to_radians() * 0.5).sin_cos();
    let (sy, cy) = (yaw.to_radians() * 0.5).sin_cos();
    [
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    ]
}
