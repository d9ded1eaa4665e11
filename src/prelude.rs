//! Common imports for building the agent and its tests.

pub use crate::agent::{ClassDumpAgent, ClassHookHost};
pub use crate::config::{AgentConfig, ClassFilter};
pub use crate::dump::{DumpOutcome, Dumper};
pub use crate::env::Jvmti;
pub use crate::export_agent;
pub use crate::get_default_callbacks;
pub use crate::sys::{jni, jvmti};
pub use crate::Agent;
