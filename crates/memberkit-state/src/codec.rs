//! # State Capture and Restore
//!
//! `capture` turns an instance into one ordered mapping drawn from three
//! storage sources; `restore` writes such a mapping back through ordinary
//! attribute assignment.
//!
//! ## Capture order
//!
//! 1. Dict extras, if the class has a dict, in insertion order.
//! 2. Fixed slots from the class's cached slot names, read through the
//!    normal attribute path. Names with no readable value (an unset slot,
//!    or an overridden name that matches nothing) are skipped.
//! 3. Every member, in declaration order, read through the normal read
//!    path. Unset members compute their defaults exactly as a read would.
//!
//! Later sources overwrite earlier ones on a name collision, so members
//! always win.
//!
//! ## Failure
//!
//! Capture returns no partial mapping: an erased slot-name cache is a
//! `SystemFault`, and any error raised while reading a member propagates
//! as raised. Restore applies entries in iteration order and stops at the
//! first failure; earlier writes stay applied.
//!
//! Neither operation is transactional. Concurrent mutation of the same
//! instance during capture or restore can yield a mixed snapshot or a
//! partially applied state.

use memberkit_core::{Dict, MemberError, Result, Value};
use memberkit_object::Instance;

/// Name reported in arity errors from [`restore_args`].
const RESTORE: &str = "restore";

/// Capture the instance's canonical state mapping.
///
/// # Errors
///
/// Returns `MemberError::SystemFault` if the class's slot names were erased,
/// and propagates any error raised while reading a member.
pub fn capture(instance: &Instance) -> Result<Dict> {
    let class = instance.class();
    let mut state = instance.dict_items().unwrap_or_default();
    for name in class.slot_names()?.iter() {
        match instance.get_attr(name) {
            Ok(value) => {
                state.insert(name.clone(), value);
            }
            Err(MemberError::UnknownAttribute { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    for member in class.members() {
        let value = instance.get_member(member)?;
        state.insert(member.name().to_string(), value);
    }
    tracing::trace!(class = %class.name(), entries = state.len(), "state captured");
    Ok(state)
}

/// Apply `(name, value)` pairs through ordinary attribute writes.
///
/// # Errors
///
/// Stops at the first failing write and returns its error. Entries applied
/// before the failure remain applied.
pub fn restore<I, K>(instance: &Instance, items: I) -> Result<()>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut applied = 0usize;
    for (name, value) in items {
        instance.set_attr(name.as_ref(), value)?;
        applied += 1;
    }
    tracing::trace!(class = %instance.class().name(), applied, "state restored");
    Ok(())
}

/// Restore from a positional argument list, as the generic protocol does.
///
/// # Errors
///
/// Returns `MemberError::Arity` unless exactly one argument is given and
/// `MemberError::NotAMapping` unless that argument is a mapping. Both are
/// raised before any entry is applied. Entry errors propagate as in
/// [`restore`].
pub fn restore_args(instance: &Instance, args: &[Value]) -> Result<()> {
    let [state] = args else {
        return Err(MemberError::Arity {
            callable: RESTORE.to_string(),
            expected: 1,
            given: args.len(),
        });
    };
    match state {
        Value::Dict(map) => restore(instance, map.iter().map(|(k, v)| (k, v.clone()))),
        other => Err(MemberError::NotAMapping {
            actual: other.type_name(),
        }),
    }
}

/// The state protocol as attribute-level entry points.
pub trait StateCodec {
    /// Capture the canonical state mapping.
    fn capture(&self) -> Result<Dict>;

    /// Restore from positional arguments: exactly one mapping.
    fn restore(&self, args: &[Value]) -> Result<()>;
}

impl StateCodec for Instance {
    fn capture(&self) -> Result<Dict> {
        capture(self)
    }

    fn restore(&self, args: &[Value]) -> Result<()> {
        restore_args(self, args)
    }
}
