mod common;

use rigbuf_accumulation_core::{
    AccumulationTable, ControlType, Name, TargetHandle, TargetRegistry, TrackId, Value,
    ValueKind,
};
use rigbuf_test_fixtures::{RecordingRig, RigCall};

fn registry_with(rig: RecordingRig) -> (TargetRegistry<RecordingRig>, TargetHandle) {
    let mut rigs = TargetRegistry::new();
    let handle = rigs.insert(rig);
    (rigs, handle)
}

#[test]
fn speed_and_enabled_apply_once_from_two_workers() {
    let (mut rigs, target_a) = registry_with(RecordingRig::new("A"));
    let t1 = TrackId(1);
    let speed = Name::new("Speed");
    let enabled = Name::new("Enabled");

    let mut table = AccumulationTable::new();
    table.prime_for_cycle();
    table.ensure_entry(t1, target_a);
    // One batch per worker.
    let mut batches = vec![
        table.allocate_batch(t1, [(speed, ValueKind::Scalar)]),
        table.allocate_batch(t1, [(enabled, ValueKind::Bool)]),
    ];
    table.gather_parallel(&mut batches, |i, writer| match i {
        0 => writer.store(0, 3.5f32),
        _ => writer.store(0, true),
    });

    let stats = table.apply_all(&mut rigs);
    assert_eq!(stats.values_applied, 2);
    let rig = rigs.get(target_a).unwrap();
    let speed_calls = rig.calls_for("Speed");
    let enabled_calls = rig.calls_for("Enabled");
    assert_eq!(speed_calls, vec![&RigCall::SetValue(speed, Value::Scalar(3.5))]);
    assert_eq!(enabled_calls, vec![&RigCall::SetValue(enabled, Value::Bool(true))]);

    assert_eq!(table.compact(), 0);
    assert!(table.contains_owner(t1));
    common::assert_partition(&table);
}

#[test]
fn unprimed_track_is_pruned_with_its_mapping() {
    let (_rigs, target) = registry_with(RecordingRig::new("A"));
    let t1 = TrackId(1);
    let t2 = TrackId(2);

    let mut table = AccumulationTable::new();
    table.prime_for_cycle();
    table.ensure_entry(t1, target);
    table.ensure_entry(t2, target);
    table.compact();
    assert_eq!(table.len(), 2);

    table.prime_for_cycle();
    table.ensure_entry(t1, target);
    assert!(table.entries().iter().all(|e| e.is_active() == (e.owner() == t1)));
    assert_eq!(table.compact(), 1);
    assert!(!table.contains_owner(t2));
    assert!(table.find_parameters(t2).is_none());
    assert_eq!(table.len(), 1);
    common::assert_partition(&table);
}

#[test]
fn entries_are_reset_between_cycles() {
    let (mut rigs, target) = registry_with(RecordingRig::new("A"));
    let owner = TrackId(0);
    let mut table = AccumulationTable::new();

    table.prime_for_cycle();
    table.ensure_entry(owner, target);
    let h = table.allocate_slot(owner, Name::new("Weight"), ValueKind::Scalar);
    table.store(h, 0.75f32);
    table.apply_all(&mut rigs);

    table.prime_for_cycle();
    table.ensure_entry(owner, target);
    let set = table.find_parameters(owner).unwrap();
    assert!(set.is_empty());
    assert!(set.store(ValueKind::Scalar).capacity() >= 8);
    let stats = table.apply_all(&mut rigs);
    assert_eq!(stats.values_applied, 0);
    assert_eq!(rigs.get(target).unwrap().calls().len(), 1);
}

#[test]
fn expired_target_is_skipped_then_pruned() {
    let mut rigs = TargetRegistry::new();
    let keep = rigs.insert(RecordingRig::new("keep"));
    let drop_me = rigs.insert(RecordingRig::new("drop"));
    let mut table = AccumulationTable::new();

    table.prime_for_cycle();
    table.ensure_entry(TrackId(0), keep);
    table.ensure_entry(TrackId(1), drop_me);
    for owner in [TrackId(0), TrackId(1)] {
        let h = table.allocate_slot(owner, Name::new("Enabled"), ValueKind::Bool);
        table.store(h, true);
    }
    rigs.remove(drop_me);
    let stats = table.apply_all(&mut rigs);
    assert_eq!(stats.entries_applied, 1);
    assert_eq!(stats.entries_skipped, 1);

    // The owner of the dead target stops being primed.
    table.prime_for_cycle();
    table.ensure_entry(TrackId(0), keep);
    assert_eq!(table.compact(), 1);
    assert!(!table.contains_owner(TrackId(1)));
}

#[test]
fn duplicate_request_allocates_two_slots() {
    let (mut rigs, target) = registry_with(RecordingRig::new("A"));
    let owner = TrackId(0);
    let name = Name::new("Speed");
    let mut table = AccumulationTable::new();
    table.prime_for_cycle();
    table.ensure_entry(owner, target);
    let a = table.allocate_slot(owner, name, ValueKind::Scalar);
    let b = table.allocate_slot(owner, name, ValueKind::Scalar);
    assert_ne!(a, b);
    table.store(a, 1.0f32);
    table.store(b, 2.0f32);
    table.apply_all(&mut rigs);
    // Both slots are applied, in allocation order.
    assert_eq!(
        rigs.get(target).unwrap().calls(),
        &[
            RigCall::SetValue(name, Value::Scalar(1.0)),
            RigCall::SetValue(name, Value::Scalar(2.0)),
        ]
    );
}

#[test]
fn retargeting_an_entry_applies_to_the_new_target() {
    let mut rigs = TargetRegistry::new();
    let old = rigs.insert(RecordingRig::new("old"));
    let new = rigs.insert(
        RecordingRig::new("new").with_control("head_rot", ControlType::Rotator, Value::Vector3([0.0; 3])),
    );
    let owner = TrackId(4);
    let mut table = AccumulationTable::new();

    table.prime_for_cycle();
    table.ensure_entry(owner, old);
    table.prime_for_cycle();
    table.ensure_entry(owner, new);
    let h = table.allocate_slot(owner, Name::new("head_rot"), ValueKind::Vector3);
    table.store(h, [0.0f32, 0.0, 30.0]);
    table.apply_all(&mut rigs);
    assert!(rigs.get(old).unwrap().calls().is_empty());
    assert_eq!(rigs.get(new).unwrap().calls().len(), 3);
}
