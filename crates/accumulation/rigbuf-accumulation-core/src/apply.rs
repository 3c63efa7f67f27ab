//! Per-kind dispatch of accumulated values onto a rig target.

use rigbuf_api_core::{ControlType, Name, ParentSelector, RigTarget, Value};

/// Push one accumulated value onto `target`.
///
/// Rotation-bearing values also feed the target's specified-Euler side
/// channel, and the quaternion derived from it, before the value itself.
pub fn apply_value<T: RigTarget + ?Sized>(target: &mut T, name: Name, value: Value) {
    match value {
        Value::Space(key) => target.switch_parent(name, ParentSelector::from(key)),
        Value::Bool(_) | Value::Enum(_) | Value::Integer(_) | Value::Scalar(_) => {
            target.set_named_value(name, value)
        }
        Value::Vector3(v) => {
            if target.control_type(name) == Some(ControlType::Rotator) {
                push_euler(target, name, v);
            }
            target.set_named_value(name, value);
        }
        Value::Transform(t) => {
            push_euler(target, name, t.rotation);
            target.set_named_value(name, value);
        }
    }
}

fn push_euler<T: RigTarget + ?Sized>(target: &mut T, name: Name, euler: [f32; 3]) {
    target.set_specified_euler(name, euler);
    let rotation = target.control_quaternion(name, euler);
    target.set_rotation(name, rotation);
}
