//! # Classes: Member Tables and Storage Layout
//!
//! A [`Class`] owns the member descriptors and storage layout shared by all
//! of its instances. Classes are built once through [`ClassBuilder`] and
//! are immutable afterwards, except for the slot-name bookkeeping cache.
//!
//! ## Member indices
//!
//! Every member owns one storage index in its instances' member table.
//! Inherited members keep their base-class index. A member redeclared on a
//! subclass reuses the index of the member it overrides. When two bases
//! place different members on the same index, the later one is duplicated
//! and moved to a fresh index past every base's table.
//!
//! ## Slot names
//!
//! `slot_names()` lists the fixed storage slots across the inheritance
//! chain, subclass first, without the reserved `__dict__` and
//! `__weakref__` entries. It is computed on first request and cached on the
//! class. Integrators may override or erase the cache; an erased cache is a
//! broken environment and surfaces as `SystemFault`.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use memberkit_core::{Constructor, Kind, Kwargs, MemberError, Result, Value};
use memberkit_member::Member;
use parking_lot::RwLock;

use crate::instance::Instance;

/// Slot names reserved for engine bookkeeping.
pub const RESERVED_SLOT_NAMES: [&str; 2] = ["__dict__", "__weakref__"];

/// Slot name that enables dict extras when declared.
pub const DICT_SLOT: &str = "__dict__";

/// Whether `name` is one of the reserved bookkeeping slots.
pub fn is_reserved_slot(name: &str) -> bool {
    RESERVED_SLOT_NAMES.contains(&name)
}

// ─── Slot-name cache ────────────────────────────────────────────────

/// State of a class's slot-name bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotNames {
    /// Not computed yet.
    Pending,
    /// Computed or overridden.
    Ready(Arc<[String]>),
    /// Removed by an integrator. Enumeration fails until restored.
    Erased,
}

// ─── Class ──────────────────────────────────────────────────────────

/// A class built from members, slots, and bases.
#[derive(Clone)]
pub struct Class(Arc<ClassInner>);

struct ClassInner {
    name: String,
    kind: Kind,
    bases: Vec<Class>,
    members: IndexMap<String, Arc<Member>>,
    member_count: usize,
    own_slots: Vec<String>,
    slot_layout: IndexMap<String, usize>,
    has_dict: bool,
    slot_names: RwLock<SlotNames>,
}

impl Class {
    /// The class name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The runtime kind of this class's instances.
    pub fn kind(&self) -> &Kind {
        &self.0.kind
    }

    /// Direct base classes, in declaration order.
    pub fn bases(&self) -> &[Class] {
        &self.0.bases
    }

    /// All members, inherited first, in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &Arc<Member>> {
        self.0.members.values()
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&Arc<Member>> {
        self.0.members.get(name)
    }

    /// Size of the per-instance member table.
    pub fn member_count(&self) -> usize {
        self.0.member_count
    }

    /// Whether instances carry a free-form attribute dict.
    pub fn has_dict(&self) -> bool {
        self.0.has_dict
    }

    /// Slots declared directly on this class, reserved names included.
    pub fn own_slots(&self) -> &[String] {
        &self.0.own_slots
    }

    /// Storage index of a fixed slot, if `name` is one.
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.0.slot_layout.get(name).copied()
    }

    /// Number of fixed slots per instance.
    pub fn slot_count(&self) -> usize {
        self.0.slot_layout.len()
    }

    /// Whether this class is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.kind().is_subtype_of(other.kind())
    }

    /// Classes in linearized order, this class first.
    pub fn linearized(&self) -> Vec<Class> {
        let order: Vec<Class> = std::iter::once(self.clone())
            .chain(self.bases().iter().flat_map(Class::linearized))
            .collect();
        order
            .iter()
            .enumerate()
            .filter(|&(i, c)| !order[i + 1..].iter().any(|later| later.ptr_eq(c)))
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// The fixed slot names across the inheritance chain.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::SystemFault` if the cache was erased.
    pub fn slot_names(&self) -> Result<Arc<[String]>> {
        if let Some(names) = self.cached_slot_names()? {
            return Ok(names);
        }
        let computed: Arc<[String]> = self.compute_slot_names().into();
        let mut cache = self.0.slot_names.write();
        match &*cache {
            SlotNames::Ready(names) => Ok(names.clone()),
            SlotNames::Erased => Err(self.erased_fault()),
            SlotNames::Pending => {
                tracing::trace!(class = %self.name(), slots = computed.len(), "slot names computed");
                *cache = SlotNames::Ready(computed.clone());
                Ok(computed)
            }
        }
    }

    /// Current state of the slot-name cache.
    pub fn slot_names_state(&self) -> SlotNames {
        self.0.slot_names.read().clone()
    }

    /// Override the slot-name cache, or erase it with `None`.
    pub fn set_slot_names(&self, names: Option<Vec<String>>) {
        let state = match names {
            Some(names) => SlotNames::Ready(names.into()),
            None => SlotNames::Erased,
        };
        *self.0.slot_names.write() = state;
    }

    /// Drop any cached or overridden slot names so they are recomputed.
    pub fn reset_slot_names(&self) {
        *self.0.slot_names.write() = SlotNames::Pending;
    }

    /// Create an instance with every field unset.
    pub fn instantiate(&self) -> Arc<Instance> {
        Arc::new(Instance::new(self))
    }

    /// Call the class: create an instance and assign keyword arguments.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Arity` for positional arguments and propagates
    /// any error raised while assigning keywords.
    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> Result<Arc<Instance>> {
        if !args.is_empty() {
            return Err(MemberError::Arity {
                callable: self.name().to_string(),
                expected: 0,
                given: args.len(),
            });
        }
        let instance = self.instantiate();
        for (name, value) in kwargs {
            instance.set_attr(name, value.clone())?;
        }
        Ok(instance)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Class) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn cached_slot_names(&self) -> Result<Option<Arc<[String]>>> {
        match &*self.0.slot_names.read() {
            SlotNames::Ready(names) => Ok(Some(names.clone())),
            SlotNames::Erased => Err(self.erased_fault()),
            SlotNames::Pending => Ok(None),
        }
    }

    fn compute_slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for class in self.linearized() {
            for slot in class.own_slots() {
                if !is_reserved_slot(slot) && !names.contains(slot) {
                    names.push(slot.clone());
                }
            }
        }
        names
    }

    fn erased_fault(&self) -> MemberError {
        MemberError::SystemFault(format!(
            "slot name bookkeeping for class '{}' has been erased",
            self.name()
        ))
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.0.name)
            .field("members", &self.0.members.keys().collect::<Vec<_>>())
            .field("slots", &self.0.slot_layout.keys().collect::<Vec<_>>())
            .field("has_dict", &self.0.has_dict)
            .finish()
    }
}

// ─── Builder ────────────────────────────────────────────────────────

/// Declarative class construction.
pub struct ClassBuilder {
    name: String,
    bases: Vec<Class>,
    slots: Vec<String>,
    dict: bool,
    members: Vec<(String, Member)>,
}

impl ClassBuilder {
    /// Start declaring a class named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            slots: Vec::new(),
            dict: false,
            members: Vec::new(),
        }
    }

    /// Add a base class.
    pub fn extends(mut self, base: &Class) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Declare one fixed slot. `__dict__` enables dict extras.
    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slots.push(name.into());
        self
    }

    /// Declare several fixed slots.
    pub fn slots<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slots.extend(names.into_iter().map(Into::into));
        self
    }

    /// Give instances a free-form attribute dict.
    pub fn with_dict(mut self) -> Self {
        self.dict = true;
        self
    }

    /// Declare a member.
    pub fn member(mut self, name: impl Into<String>, member: impl Into<Member>) -> Self {
        self.members.push((name.into(), member.into()));
        self
    }

    /// Build the class.
    ///
    /// # Errors
    ///
    /// Returns `MemberError::Declaration` for empty or duplicate member
    /// names, duplicate slot names, or a slot that shadows a member.
    pub fn build(self) -> Result<Class> {
        self.check_names()?;

        let mut members: IndexMap<String, Arc<Member>> = IndexMap::new();
        let mut used: HashSet<usize> = HashSet::new();
        let mut next = self.bases.iter().map(Class::member_count).max().unwrap_or(0);
        for base in &self.bases {
            for member in base.members() {
                if members.contains_key(member.name()) {
                    continue;
                }
                let member = if used.insert(member.index()) {
                    member.clone()
                } else {
                    let mut moved = member.duplicate();
                    moved.set_index(next);
                    used.insert(next);
                    next += 1;
                    Arc::new(moved)
                };
                let name = member.name().to_string();
                members.insert(name, member);
            }
        }
        for (name, mut member) in self.members {
            match members.get(&name) {
                Some(inherited) => member.set_index(inherited.index()),
                None => {
                    member.set_index(next);
                    next += 1;
                }
            }
            member.set_name(name.clone());
            members.insert(name, Arc::new(member));
        }

        let mut slot_layout: IndexMap<String, usize> = IndexMap::new();
        let inherited = self.bases.iter().flat_map(|b| b.0.slot_layout.keys());
        for slot in inherited.chain(self.slots.iter()) {
            if !is_reserved_slot(slot) && !slot_layout.contains_key(slot) {
                let index = slot_layout.len();
                slot_layout.insert(slot.clone(), index);
            }
        }

        let has_dict = self.dict
            || self.slots.iter().any(|s| s == DICT_SLOT)
            || self.bases.iter().any(Class::has_dict);

        let base_kinds: Vec<Kind> = self.bases.iter().map(|b| b.kind().clone()).collect();
        let name = self.name;
        let own_slots = self.slots;
        let bases = self.bases;
        let inner = Arc::new_cyclic(|weak: &Weak<ClassInner>| {
            let kind = Kind::new(name.clone(), &base_kinds);
            // A freshly created kind has no constructor yet.
            let _ = kind.set_constructor(class_constructor(weak.clone()));
            ClassInner {
                name,
                kind,
                bases,
                members,
                member_count: next,
                own_slots,
                slot_layout,
                has_dict,
                slot_names: RwLock::new(SlotNames::Pending),
            }
        });
        tracing::debug!(
            class = %inner.name,
            members = inner.members.len(),
            slots = inner.slot_layout.len(),
            dict = inner.has_dict,
            "class built"
        );
        Ok(Class(inner))
    }

    fn check_names(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for (name, _) in &self.members {
            if name.is_empty() {
                return Err(MemberError::Declaration(format!(
                    "class '{}' declares a member with an empty name",
                    self.name
                )));
            }
            if !seen.insert(name) {
                return Err(MemberError::Declaration(format!(
                    "class '{}' declares member '{name}' twice",
                    self.name
                )));
            }
        }
        let mut slots: HashSet<&str> = HashSet::new();
        for slot in &self.slots {
            if !slots.insert(slot) {
                return Err(MemberError::Declaration(format!(
                    "class '{}' declares slot '{slot}' twice",
                    self.name
                )));
            }
            if seen.contains(slot.as_str()) {
                return Err(MemberError::Declaration(format!(
                    "slot '{slot}' conflicts with a member of class '{}'",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

fn class_constructor(class: Weak<ClassInner>) -> Constructor {
    Arc::new(move |kind: &Kind, args: &[Value], kwargs: &Kwargs| {
        let inner = class.upgrade().ok_or_else(|| {
            MemberError::SystemFault(format!("class '{}' has been dropped", kind.name()))
        })?;
        Class(inner).call(args, kwargs).map(Value::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memberkit_member::Typed;

    fn point() -> Class {
        ClassBuilder::new("Point")
            .member("x", Typed::new(Kind::int()))
            .member("y", Typed::new(Kind::int()))
            .build()
            .unwrap()
    }

    #[test]
    fn members_get_sequential_indices() {
        let class = point();
        let indices: Vec<(&str, usize)> = class.members().map(|m| (m.name(), m.index())).collect();
        assert_eq!(indices, vec![("x", 0), ("y", 1)]);
        assert_eq!(class.member_count(), 2);
    }

    #[test]
    fn subclass_inherits_and_overrides_in_place() {
        let base = point();
        let child = ClassBuilder::new("Point3")
            .extends(&base)
            .member("z", Typed::new(Kind::int()))
            .member("x", Member::value(0))
            .build()
            .unwrap();
        let names: Vec<&str> = child.members().map(|m| m.name()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert_eq!(child.member("x").unwrap().index(), 0);
        assert_eq!(child.member("z").unwrap().index(), 2);
        assert!(child.is_subclass_of(&base));
    }

    #[test]
    fn conflicting_indices_are_moved() {
        let a = ClassBuilder::new("A").member("a", Member::new()).build().unwrap();
        let b = ClassBuilder::new("B").member("b", Member::new()).build().unwrap();
        let c = ClassBuilder::new("C").extends(&a).extends(&b).build().unwrap();
        assert_eq!(c.member("a").unwrap().index(), 0);
        assert_eq!(c.member("b").unwrap().index(), 1);
        assert_eq!(c.member_count(), 2);
        assert_eq!(b.member("b").unwrap().index(), 0);
    }

    #[test]
    fn slot_names_follow_linearization_and_skip_reserved() {
        let base = ClassBuilder::new("Base").slots(["a", "__weakref__"]).build().unwrap();
        let child = ClassBuilder::new("Child")
            .extends(&base)
            .slots(["b", "__dict__"])
            .build()
            .unwrap();
        assert!(child.has_dict());
        assert!(!base.has_dict());
        assert_eq!(&*child.slot_names().unwrap(), &["b".to_string(), "a".to_string()]);
        assert_eq!(child.slot_count(), 2);
    }

    #[test]
    fn slot_names_are_cached_once() {
        let class = ClassBuilder::new("S").slot("a").build().unwrap();
        assert_eq!(class.slot_names_state(), SlotNames::Pending);
        let first = class.slot_names().unwrap();
        let second = class.slot_names().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn erased_slot_names_are_a_system_fault() {
        let class = ClassBuilder::new("S").slot("a").build().unwrap();
        class.set_slot_names(None);
        let err = class.slot_names().unwrap_err();
        assert!(err.is_system_fault());
        class.reset_slot_names();
        assert_eq!(class.slot_names().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let err = ClassBuilder::new("Dup")
            .member("x", Member::new())
            .member("x", Member::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, MemberError::Declaration(_)));
        let err = ClassBuilder::new("Clash")
            .member("x", Member::new())
            .slot("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, MemberError::Declaration(_)));
    }

    #[test]
    fn calling_rejects_positional_arguments() {
        let class = point();
        let err = class.call(&[Value::Int(1)], &Kwargs::new()).unwrap_err();
        assert!(matches!(err, MemberError::Arity { given: 1, .. }));
    }

    #[test]
    fn calling_the_kind_builds_instances() {
        let class = point();
        let mut kwargs = Kwargs::new();
        kwargs.insert("x".into(), Value::Int(3));
        let value = class.kind().construct(&[], &kwargs).unwrap();
        assert_eq!(value.kind(), *class.kind());
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get_attr("x").unwrap(), Value::Int(3));
    }
}
