//! # memberkit-state: Object State Capture and Restore
//!
//! The state protocol merges an instance's three storage sources into one
//! ordered mapping and applies such a mapping back. Its shape is part of
//! the public contract: external serializers see exactly what `capture`
//! returns.
//!
//! ## Modules
//!
//! - **codec** (`codec.rs`): `capture`, `restore`, `restore_args`, and the
//!   `StateCodec` trait implemented for every `Instance`.
//!
//! - **serial** (`serial.rs`): the `Snapshot` serde adapter and the tagged
//!   JSON encoding used to move state in and out of the process.

pub mod codec;
pub mod serial;

pub use codec::{capture, restore, restore_args, StateCodec};
pub use serial::{
    decode_state, decode_value, encode_state, encode_value, CodecError, Snapshot, CLASS_TAG,
    DATETIME_TAG, STATE_TAG,
};
