//! High-level environment wrappers.
//!
//! [`Jvmti`] wraps the raw `jvmtiEnv` pointer with `Result`-returning
//! methods for the calls the agent makes:
//!
//! - **Capabilities**: query potential capabilities, add capabilities
//! - **Events**: install callbacks, enable or disable events
//! - **Memory**: release JVMTI-allocated buffers
//! - **Diagnostics**: error names
//!
//! ```rust,ignore
//! use class_dump_agent::prelude::*;
//!
//! let jvmti = Jvmti::new(vm)?;
//! jvmti.add_capabilities_with(|caps| caps.set_can_generate_all_class_hook_events(true))?;
//! jvmti.set_event_callbacks(get_default_callbacks())?;
//! jvmti.enable_events_global(&[jvmti::JVMTI_EVENT_CLASS_FILE_LOAD_HOOK])?;
//! ```

pub use crate::jvmti_wrapper::Jvmti;
