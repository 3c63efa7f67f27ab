//! Shared rig and track fixtures plus a recording rig target for tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use rigbuf_api_core::json::parse_value;
use rigbuf_api_core::{ControlType, Name, ParentSelector, RigTarget, SpaceKey, Value, ValueKind};

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    rigs: HashMap<String, String>,
    tracks: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a String> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn shorthand_value<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    parse_value(raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlFixture {
    pub name: Name,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    #[serde(deserialize_with = "shorthand_value")]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RigFixture {
    pub name: String,
    pub controls: Vec<ControlFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelFixture {
    pub name: Name,
    #[serde(deserialize_with = "shorthand_value")]
    pub value: Value,
    /// Units per second added to scalar and vector components.
    #[serde(default)]
    pub rate: f32,
}

impl ChannelFixture {
    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Value at `time`: linear in time for scalars and vectors, constant
    /// otherwise.
    pub fn sample(&self, time: f32) -> Value {
        let delta = self.rate * time;
        match self.value {
            Value::Scalar(v) => Value::Scalar(v + delta),
            Value::Vector3(v) => Value::Vector3(v.map(|c| c + delta)),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackFixture {
    pub owner: u32,
    pub channels: Vec<ChannelFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackSetFixture {
    pub rig: String,
    pub tracks: Vec<TrackFixture>,
}

pub mod rigs {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.rigs.keys().cloned().collect()
    }

    pub fn load(name: &str) -> Result<RigFixture> {
        let rel = lookup(&MANIFEST.rigs, "rig", name)?;
        super::load_json(rel)
    }

    /// Recording rig initialized from the named fixture.
    pub fn rig(name: &str) -> Result<RecordingRig> {
        load(name).map(|fixture| RecordingRig::from_fixture(&fixture))
    }
}

pub mod tracks {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.tracks.keys().cloned().collect()
    }

    pub fn load(name: &str) -> Result<TrackSetFixture> {
        let rel = lookup(&MANIFEST.tracks, "track", name)?;
        super::load_json(rel)
    }
}

/// One observed call on a [`RecordingRig`].
#[derive(Debug, Clone, PartialEq)]
pub enum RigCall {
    SetValue(Name, Value),
    SwitchParent(Name, ParentSelector),
    SpecifiedEuler(Name, [f32; 3]),
    Rotation(Name, [f32; 4]),
}

/// Rig target that keeps current values and records every call made on it.
#[derive(Debug, Clone, Default)]
pub struct RecordingRig {
    pub name: String,
    controls: HashMap<Name, ControlType>,
    values: HashMap<Name, Value>,
    calls: Vec<RigCall>,
}

impl RecordingRig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_fixture(fixture: &RigFixture) -> Self {
        let mut rig = Self::new(fixture.name.clone());
        for control in &fixture.controls {
            rig.add_control(control.name, control.control_type, control.value);
        }
        rig
    }

    pub fn add_control(&mut self, name: Name, control_type: ControlType, value: Value) {
        self.controls.insert(name, control_type);
        self.values.insert(name, value);
    }

    pub fn with_control(mut self, name: &str, control_type: ControlType, value: Value) -> Self {
        self.add_control(Name::new(name), control_type, value);
        self
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.values.get(&Name::new(name)).copied()
    }

    pub fn calls(&self) -> &[RigCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<RigCall> {
        std::mem::take(&mut self.calls)
    }

    /// Calls that touched `name`.
    pub fn calls_for(&self, name: &str) -> Vec<&RigCall> {
        let name = Name::new(name);
        self.calls
            .iter()
            .filter(|call| match call {
                RigCall::SetValue(n, _)
                | RigCall::SwitchParent(n, _)
                | RigCall::SpecifiedEuler(n, _)
                | RigCall::Rotation(n, _) => *n == name,
            })
            .collect()
    }
}

impl RigTarget for RecordingRig {
    fn set_named_value(&mut self, name: Name, value: Value) {
        self.values.insert(name, value);
        self.calls.push(RigCall::SetValue(name, value));
    }

    fn switch_parent(&mut self, element: Name, parent: ParentSelector) {
        let key = match parent {
            ParentSelector::Default => SpaceKey::parent(),
            ParentSelector::World => SpaceKey::world(),
            ParentSelector::Element(e) => SpaceKey::element(e),
        };
        self.values.insert(element, Value::Space(key));
        self.calls.push(RigCall::SwitchParent(element, parent));
    }

    fn control_type(&self, name: Name) -> Option<ControlType> {
        self.controls.get(&name).copied()
    }

    fn set_specified_euler(&mut self, name: Name, euler: [f32; 3]) {
        self.calls.push(RigCall::SpecifiedEuler(name, euler));
    }

    fn set_rotation(&mut self, name: Name, rotation: [f32; 4]) {
        self.calls.push(RigCall::Rotation(name, rotation));
    }

    fn current_value(&self, name: Name, kind: ValueKind) -> Option<Value> {
        self.values.get(&name).copied().filter(|v| v.kind() == kind)
    }
}
