//! Raw FFI bindings.
//!
//! Only the types and table slots the agent calls are named. See the header
//! comment of each file for the layout rules.

pub mod jni;
pub mod jvmti;
