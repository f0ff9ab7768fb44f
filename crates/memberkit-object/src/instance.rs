//! # Instances: Per-Object Storage and Attribute Dispatch
//!
//! An [`Instance`] holds three storage areas sized by its class: the member
//! table, the fixed slots, and (when the class allows it) a free-form dict
//! of extra attributes.
//!
//! Attribute access dispatches to a member first, then a fixed slot, then
//! the dict. A name matching none of them is an `UnknownAttribute`.
//!
//! ## Members
//!
//! Reading an unset member computes its default through the member's
//! default mode, validates it, and stores it. Writing a member validates
//! the new value against the currently stored one (or `None`). Storage
//! locks are released before any member callback runs, so callbacks may
//! read and write other attributes of the same instance.

use std::any::Any;
use std::fmt;

use memberkit_core::{Dict, Kind, MemberError, Object, Result, Value};
use memberkit_member::Member;
use parking_lot::RwLock;

use crate::class::Class;

/// An object whose attributes are governed by a [`Class`].
pub struct Instance {
    class: Class,
    members: RwLock<Vec<Option<Value>>>,
    slots: RwLock<Vec<Option<Value>>>,
    dict: Option<RwLock<Dict>>,
}

impl Instance {
    /// Allocate storage for an instance of `class`, with every field unset.
    pub fn new(class: &Class) -> Self {
        Self {
            class: class.clone(),
            members: RwLock::new(vec![None; class.member_count()]),
            slots: RwLock::new(vec![None; class.slot_count()]),
            dict: class.has_dict().then(|| RwLock::new(Dict::new())),
        }
    }

    /// The instance's class.
    pub fn class(&self) -> &Class {
        &self.class
    }

    /// Read an attribute: member, then fixed slot, then dict.
    pub fn get_attr(&self, name: &str) -> Result<Value> {
        if let Some(member) = self.class.member(name) {
            return self.get_member(member);
        }
        if let Some(index) = self.class.slot_index(name) {
            return self
                .slots
                .read()
                .get(index)
                .cloned()
                .flatten()
                .ok_or_else(|| self.unknown(name));
        }
        if let Some(dict) = &self.dict {
            if let Some(value) = dict.read().get(name) {
                return Ok(value.clone());
            }
        }
        Err(self.unknown(name))
    }

    /// Write an attribute: member, then fixed slot, then dict.
    pub fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        if let Some(member) = self.class.member(name) {
            return self.set_member(member, value);
        }
        if let Some(index) = self.class.slot_index(name) {
            let mut slots = self.slots.write();
            let slot = slots.get_mut(index).ok_or_else(|| self.layout_fault(name))?;
            *slot = Some(value);
            return Ok(());
        }
        if let Some(dict) = &self.dict {
            dict.write().insert(name.to_string(), value);
            return Ok(());
        }
        Err(self.unknown(name))
    }

    /// Delete an attribute.
    ///
    /// A deleted member becomes unset and recomputes its default on the
    /// next read. Deleting an unset slot or a missing dict entry is an
    /// `UnknownAttribute`.
    pub fn del_attr(&self, name: &str) -> Result<()> {
        if let Some(member) = self.class.member(name) {
            let mut members = self.members.write();
            let stored = members
                .get_mut(member.index())
                .ok_or_else(|| self.layout_fault(name))?;
            *stored = None;
            return Ok(());
        }
        if let Some(index) = self.class.slot_index(name) {
            let mut slots = self.slots.write();
            return match slots.get_mut(index).and_then(Option::take) {
                Some(_) => Ok(()),
                None => Err(self.unknown(name)),
            };
        }
        if let Some(dict) = &self.dict {
            if dict.write().shift_remove(name).is_some() {
                return Ok(());
            }
        }
        Err(self.unknown(name))
    }

    /// Read a member, computing and storing its default when unset.
    pub fn get_member(&self, member: &Member) -> Result<Value> {
        if let Some(value) = self.stored(member) {
            return Ok(value);
        }
        let value = member.initial_value(self)?;
        let mut members = self.members.write();
        let stored = members
            .get_mut(member.index())
            .ok_or_else(|| self.layout_fault(member.name()))?;
        // A callback may have written the member while the default ran.
        Ok(stored.get_or_insert(value).clone())
    }

    /// Validate and write a member.
    pub fn set_member(&self, member: &Member, value: Value) -> Result<()> {
        let old = self.stored(member).unwrap_or_default();
        let value = member.do_validate(self, &old, value)?;
        let mut members = self.members.write();
        let stored = members
            .get_mut(member.index())
            .ok_or_else(|| self.layout_fault(member.name()))?;
        *stored = Some(value);
        Ok(())
    }

    /// Whether the named member currently holds a value.
    pub fn is_member_set(&self, name: &str) -> bool {
        self.class
            .member(name)
            .is_some_and(|member| self.stored(member).is_some())
    }

    /// The value of a fixed slot, or `None` if unset or not a slot.
    pub fn slot_value(&self, name: &str) -> Option<Value> {
        let index = self.class.slot_index(name)?;
        self.slots.read().get(index).cloned().flatten()
    }

    /// A snapshot of the dict extras, or `None` if the class has no dict.
    pub fn dict_items(&self) -> Option<Dict> {
        self.dict.as_ref().map(|dict| dict.read().clone())
    }

    fn stored(&self, member: &Member) -> Option<Value> {
        self.members.read().get(member.index()).cloned().flatten()
    }

    fn unknown(&self, name: &str) -> MemberError {
        MemberError::UnknownAttribute {
            class: self.class.name().to_string(),
            name: name.to_string(),
        }
    }

    fn layout_fault(&self, name: &str) -> MemberError {
        MemberError::SystemFault(format!(
            "storage for '{name}' is outside the layout of class '{}'",
            self.class.name()
        ))
    }
}

impl Object for Instance {
    fn kind(&self) -> &Kind {
        self.class.kind()
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        Instance::get_attr(self, name)
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        Instance::set_attr(self, name, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self.members.read().iter().filter(|v| v.is_some()).count();
        f.debug_struct("Instance")
            .field("class", &self.class.name())
            .field("members_set", &set)
            .field("has_dict", &self.dict.is_some())
            .finish()
    }
}
