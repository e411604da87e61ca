extern crate membrane;

use membrane::runner::ds::error::MembraneError;
use membrane::runner::ds::function_object::{FunctionKind, FunctionObject};
use membrane::runner::ds::object::{GuestObject, HostObjectBuilder};
use membrane::runner::ds::object_property::PropertySlot;
use membrane::runner::ds::value::Value;
use membrane::runner::eval::guardian;
use membrane::runner::eval::property;
use membrane::runner::plugin::capability::{Capability, CapabilitySet};
use membrane::runner::plugin::registry::{GrantRegistry, Subject};
use proptest::prelude::*;

/// Helper to build a Widget host object and a registry granting parts of it
fn widget_setup() -> (GrantRegistry, Value) {
    let mut registry = GrantRegistry::new();
    registry
        .grant(
            Subject::class("Widget"),
            "title",
            CapabilitySet::READ | CapabilitySet::WRITE | CapabilitySet::ENUMERATE,
        )
        .unwrap();
    registry
        .grant(Subject::class("Widget"), "secret", CapabilitySet::READ)
        .unwrap();
    registry
        .grant(
            Subject::class("Widget"),
            "id",
            CapabilitySet::READ | CapabilitySet::WRITE | CapabilitySet::DELETE,
        )
        .unwrap();
    let w = HostObjectBuilder::new("Widget")
        .add_property("title", Value::str("Hello"))
        .add_property("secret", Value::str("s3cr3t"))
        .add_fixed_property("id", Value::str("w1"))
        .add_property("internal", Value::int(7))
        .build();
    (registry, Value::Object(w))
}

// ── Scenario A ───────────────────────────────────────────────────────

#[test]
fn test_read_only_grant_blocks_write() {
    let mut registry = GrantRegistry::new();
    let o = Value::Object(GuestObject::plain_from(vec![("x", Value::int(1))]));
    registry
        .grant(Subject::instance_of(&o).unwrap(), "x", CapabilitySet::READ)
        .unwrap();

    let result = property::write(&registry, &o, "x", Value::int(5));
    match result {
        Err(MembraneError::CapabilityDenied { capability, member }) => {
            assert_eq!(capability, Capability::Write);
            assert_eq!(member, "x");
        }
        other => panic!("expected denial, got {:?}", other),
    }
    assert_eq!(property::read(&registry, &o, "x").unwrap(), Value::int(1));
}

// ── Reads and writes ─────────────────────────────────────────────────

#[test]
fn test_granted_host_property_read_and_write() {
    let (registry, w) = widget_setup();
    property::write(&registry, &w, "title", Value::str("Bye")).unwrap();
    assert_eq!(property::read(&registry, &w, "title").unwrap(), Value::str("Bye"));
}

#[test]
fn test_ungranted_host_property_denied() {
    let (registry, w) = widget_setup();
    assert!(matches!(
        property::read(&registry, &w, "internal"),
        Err(MembraneError::CapabilityDenied { .. })
    ));
}

#[test]
fn test_fixed_property_is_immutable_despite_grant() {
    let (registry, w) = widget_setup();
    assert!(matches!(
        property::write(&registry, &w, "id", Value::str("w2")),
        Err(MembraneError::ImmutableField(_))
    ));
    assert!(matches!(
        property::remove(&registry, &w, "id"),
        Err(MembraneError::ImmutableField(_))
    ));
    assert_eq!(property::read(&registry, &w, "id").unwrap(), Value::str("w1"));
}

#[test]
fn test_frozen_object_rejects_writes() {
    let registry = GrantRegistry::new();
    let o = GuestObject::plain_from(vec![("a", Value::int(1))]);
    let o = Value::Object(guardian::freeze_object(&o));
    assert!(matches!(
        property::write(&registry, &o, "a", Value::int(2)),
        Err(MembraneError::ImmutableField(_))
    ));
    assert!(matches!(
        property::write(&registry, &o, "b", Value::int(2)),
        Err(MembraneError::ImmutableField(_))
    ));
    assert_eq!(property::read(&registry, &o, "b").unwrap(), Value::Missing);
}

#[test]
fn test_remove_reports_whether_removed() {
    let registry = GrantRegistry::new();
    let o = Value::Object(GuestObject::plain_from(vec![("a", Value::int(1))]));
    assert!(property::remove(&registry, &o, "a").unwrap());
    assert!(!property::remove(&registry, &o, "a").unwrap());
    assert_eq!(property::read(&registry, &o, "a").unwrap(), Value::Missing);
}

#[test]
fn test_function_statics_are_readable() {
    let registry = GrantRegistry::new();
    let f = FunctionObject::guest(Some("f"), FunctionKind::Simple, |_, _, _| Ok(Value::Undefined));
    let fv = Value::Function(f.clone());
    property::write(&registry, &fv, "version", Value::int(2)).unwrap();
    assert_eq!(property::read(&registry, &fv, "version").unwrap(), Value::int(2));
    guardian::freeze(&f);
    assert!(matches!(
        property::write(&registry, &fv, "version", Value::int(3)),
        Err(MembraneError::ImmutableField(_))
    ));
}

#[test]
fn test_undefined_operand_is_type_error() {
    let registry = GrantRegistry::new();
    let result = property::write(&registry, &Value::Undefined, "x", Value::int(1));
    assert!(matches!(result, Err(MembraneError::NotAnObject { .. })));
}

// ── Enumeration and `in` ─────────────────────────────────────────────

#[test]
fn test_enumeration_keeps_insertion_order() {
    let registry = GrantRegistry::new();
    let o = Value::Object(GuestObject::plain_from(vec![
        ("z", Value::int(1)),
        ("a", Value::int(2)),
        ("m", Value::int(3)),
    ]));
    property::write(&registry, &o, "b", Value::int(4)).unwrap();
    assert_eq!(
        property::enumerate_own_keys(&registry, &o).unwrap(),
        vec!["z", "a", "m", "b"]
    );
}

#[test]
fn test_enumeration_needs_enumerate_grant() {
    let (registry, w) = widget_setup();
    assert_eq!(
        property::enumerate_own_keys(&registry, &w).unwrap(),
        vec!["title"]
    );
}

#[test]
fn test_hidden_members_not_enumerated() {
    let registry = GrantRegistry::new();
    let o = GuestObject::plain_from(vec![("a", Value::int(1))]);
    o.borrow_mut()
        .base_mut()
        .insert("h", PropertySlot::hidden(Value::int(2)));
    let o = Value::Object(o);
    assert_eq!(property::enumerate_own_keys(&registry, &o).unwrap(), vec!["a"]);
}

#[test]
fn test_in_policy() {
    let (registry, w) = widget_setup();
    // Readable but not enumerable: visible to `in`, hidden from enumeration.
    assert!(property::has_capability_for_in(&registry, "secret", &w).unwrap());
    assert!(!property::enumerate_own_keys(&registry, &w)
        .unwrap()
        .contains(&"secret".to_string()));
    // Present but ungranted.
    assert!(!property::has_capability_for_in(&registry, "internal", &w).unwrap());
    // Granted nowhere and absent.
    assert!(!property::has_capability_for_in(&registry, "nothing", &w).unwrap());
    assert!(matches!(
        property::has_capability_for_in(&registry, "x", &Value::Null),
        Err(MembraneError::NotAnObject { .. })
    ));
}

#[test]
fn test_in_sees_callable_members() {
    let mut registry = GrantRegistry::new();
    registry
        .grant(Subject::class("Widget"), "render", CapabilitySet::CALL)
        .unwrap();
    let w = Value::Object(
        HostObjectBuilder::new("Widget")
            .add_method("render", |_, _, _| Ok(Value::Undefined))
            .build(),
    );
    assert!(property::has_capability_for_in(&registry, "render", &w).unwrap());
    assert!(property::read(&registry, &w, "render").is_err());
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::int),
        any::<bool>().prop_map(Value::Boolean),
        "[a-z]{0,12}".prop_map(Value::str),
        Just(Value::Null),
        Just(Value::Undefined),
    ]
}

proptest! {
    #[test]
    fn prop_read_then_write_back_is_a_noop(
        initial in scalar(),
        name in "[a-z]{1,8}",
    ) {
        let registry = GrantRegistry::new();
        let o = Value::Object(GuestObject::new_plain());
        property::write(&registry, &o, &name, initial.clone()).unwrap();
        let before = property::read(&registry, &o, &name).unwrap();
        property::write(&registry, &o, &name, before.clone()).unwrap();
        let after = property::read(&registry, &o, &name).unwrap();
        prop_assert_eq!(&before, &after);
        prop_assert_eq!(after, initial);
        prop_assert_eq!(
            property::enumerate_own_keys(&registry, &o).unwrap(),
            vec![name]
        );
    }
}
