//! Forward-typed members on real classes: self-reference through the
//! registry, sharing across subclasses, and independent copies under
//! multiple inheritance.

use std::sync::{Arc, Weak};

use memberkit_core::{Kind, MemberError, Result, Value};
use memberkit_member::{ForwardTyped, Member, Resolution, Typed};
use memberkit_object::{Class, ClassBuilder, TypeRegistry};
use parking_lot::RwLock;

fn lookup(registry: &Arc<RwLock<TypeRegistry>>, name: &'static str) -> ForwardTyped {
    let registry: Weak<RwLock<TypeRegistry>> = Arc::downgrade(registry);
    ForwardTyped::new(move || -> Result<Kind> {
        let registry = registry
            .upgrade()
            .ok_or_else(|| MemberError::Unresolved("registry dropped".to_string()))?;
        let kind = registry.read().resolve(name)?;
        Ok(kind)
    })
}

fn node_class(registry: &Arc<RwLock<TypeRegistry>>) -> Class {
    let class = ClassBuilder::new("Node")
        .member("value", Typed::new(Kind::int()))
        .member("next", lookup(registry, "Node"))
        .build()
        .unwrap();
    registry.write().register_class(class.clone()).unwrap();
    class
}

#[test]
fn self_referential_member_resolves_on_first_write() {
    let registry = Arc::new(RwLock::new(TypeRegistry::new()));
    let node = node_class(&registry);
    let member = node.member("next").unwrap();
    assert_eq!(ForwardTyped::resolution_of(member), Some(Resolution::Unresolved));

    let head = node.instantiate();
    let tail = node.instantiate();
    head.set_attr("next", Value::from(tail.clone())).unwrap();

    assert_eq!(
        ForwardTyped::resolution_of(member),
        Some(Resolution::Resolved(node.kind().clone()))
    );
    let next = head.get_attr("next").unwrap();
    assert!(next.is_same_object(&Value::from(tail)));

    let err = head.set_attr("next", Value::Int(1)).unwrap_err();
    match err {
        MemberError::TypeKind { class, member, expected, actual } => {
            assert_eq!(class, "Node");
            assert_eq!(member, "next");
            assert_eq!(expected, "Node");
            assert_eq!(actual, "int");
        }
        other => panic!("expected TypeKind, got: {other:?}"),
    }
}

#[test]
fn first_read_resolves_while_validating_the_default() {
    let registry = Arc::new(RwLock::new(TypeRegistry::new()));
    let node = node_class(&registry);
    let obj = node.instantiate();
    assert_eq!(obj.get_attr("next").unwrap(), Value::None);
    assert_eq!(
        ForwardTyped::resolution_of(node.member("next").unwrap()),
        Some(Resolution::Resolved(node.kind().clone()))
    );
}

#[test]
fn forward_default_constructs_the_resolved_class() {
    let registry = Arc::new(RwLock::new(TypeRegistry::new()));
    let leaf = ClassBuilder::new("Leaf")
        .member("weight", Member::value(7))
        .build()
        .unwrap();
    let tree = ClassBuilder::new("Tree")
        .member("root", lookup(&registry, "Leaf").args(Vec::<Value>::new()))
        .build()
        .unwrap();
    registry.write().register_class(leaf.clone()).unwrap();

    let obj = tree.instantiate();
    let root = obj.get_attr("root").unwrap();
    assert_eq!(root.kind(), *leaf.kind());
    let root = root.as_object().unwrap();
    assert_eq!(root.get_attr("weight").unwrap(), Value::Int(7));
    // The constructed default is cached on the instance.
    assert!(obj.get_attr("root").unwrap().is_same_object(&Value::Object(root.clone())));
}

#[test]
fn unregistered_name_propagates_and_can_succeed_later() {
    let registry = Arc::new(RwLock::new(TypeRegistry::new()));
    let holder = ClassBuilder::new("Holder")
        .member("item", lookup(&registry, "Later"))
        .build()
        .unwrap();
    let obj = holder.instantiate();
    let later = Kind::opaque("Later", &[]);
    let value = later.call0().unwrap();

    let err = obj.set_attr("item", value.clone()).unwrap_err();
    assert!(matches!(err, MemberError::Unresolved(_)));
    assert!(!obj.is_member_set("item"));

    registry.write().register_kind(later).unwrap();
    obj.set_attr("item", value).unwrap();
    assert!(obj.is_member_set("item"));
}

#[test]
fn subclasses_share_the_inherited_resolver() {
    let registry = Arc::new(RwLock::new(TypeRegistry::new()));
    let node = node_class(&registry);
    let special = ClassBuilder::new("SpecialNode").extends(&node).build().unwrap();

    let child = special.instantiate();
    child.set_attr("next", Value::from(node.instantiate())).unwrap();

    assert!(Arc::ptr_eq(node.member("next").unwrap(), special.member("next").unwrap()));
    assert!(matches!(
        ForwardTyped::resolution_of(node.member("next").unwrap()),
        Some(Resolution::Resolved(_))
    ));
}

#[test]
fn moved_member_under_multiple_inheritance_resolves_independently() {
    let registry = Arc::new(RwLock::new(TypeRegistry::new()));
    let left = ClassBuilder::new("Left")
        .member("a", lookup(&registry, "int"))
        .build()
        .unwrap();
    let right = ClassBuilder::new("Right")
        .member("b", lookup(&registry, "str"))
        .build()
        .unwrap();
    let both = ClassBuilder::new("Both").extends(&left).extends(&right).build().unwrap();

    let moved = both.member("b").unwrap();
    assert!(!Arc::ptr_eq(moved, right.member("b").unwrap()));
    assert_eq!(moved.index(), 1);

    let obj = both.instantiate();
    obj.set_attr("a", Value::Int(1)).unwrap();
    obj.set_attr("b", Value::from("x")).unwrap();
    assert_eq!(obj.get_attr("a").unwrap(), Value::Int(1));
    assert_eq!(obj.get_attr("b").unwrap(), Value::from("x"));

    assert!(matches!(ForwardTyped::resolution_of(moved), Some(Resolution::Resolved(_))));
    assert_eq!(
        ForwardTyped::resolution_of(right.member("b").unwrap()),
        Some(Resolution::Unresolved)
    );
}
