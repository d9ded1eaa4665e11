//! # class-dump-agent
//!
//! A JVMTI agent that writes the bytecode of every class the JVM loads to a
//! directory tree mirroring the package structure. It is a diagnostic tool:
//! it shows exactly what the runtime loaded, including generated and
//! instrumented classes that never existed as files.
//!
//! ## Usage
//!
//! ```bash
//! cargo build --release
//!
//! # Dump everything
//! java -agentpath:./target/release/libclass_dump_agent.so=/tmp/classes MyApp
//!
//! # Dump only classes whose dotted name starts with com.example
//! java -agentpath:./target/release/libclass_dump_agent.so=/tmp/classes?com.example MyApp
//! ```
//!
//! The agent can also be loaded into a running JVM through the Attach API
//! (`VirtualMachine.loadAgentPath`), which enters through `Agent_OnAttach`.
//! Classes loaded after that point are dumped.
//!
//! A class `com/example/Foo` ends up at `/tmp/classes/com/example/Foo.class`
//! with the exact bytes the JVM handed to `ClassFileLoadHook`. The agent never
//! changes those bytes.
//!
//! ## Failure policy
//!
//! Nothing the agent does can stop the JVM. A missing or unusable output
//! directory is reported on stderr and the agent stays inert; a failed write
//! is reported and the next class is tried as usual.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          agent::ClassDumpAgent (+ export_agent!)         │
//! │     activation guard, JVMTI registration, the hook       │
//! ├─────────────────────────────────────────────────────────┤
//! │   config            dump               classfile         │
//! │   option parsing    path mapping,      this_class from   │
//! │   + dir checks      file writes        raw bytes         │
//! ├─────────────────────────────────────────────────────────┤
//! │        Agent trait, trampolines, get_default_callbacks   │
//! ├─────────────────────────────────────────────────────────┤
//! │      env::Jvmti  ──  sys::jni / sys::jvmti (raw FFI)      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`. Set `CLASS_DUMP_LOG=debug` (or
//! `trace` to see every written file).

pub mod sys;
pub mod env;
pub mod error;
pub mod config;
pub mod classfile;
pub mod dump;
pub mod logging;
pub mod agent;
pub mod prelude;

// Implementation module (use `env` for the public API)
#[doc(hidden)]
pub mod jvmti_wrapper;

use std::os::raw::{c_char, c_uchar};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;
pub use crate::sys::jni as jni;
use crate::sys::jvmti as jvmti;

/// The callbacks a JVMTI agent can receive from the JVM.
///
/// Only the entry points and events this crate wires up are present. All
/// event methods default to no-ops.
///
/// # Thread Safety
///
/// JVMTI events fire on whatever thread triggered them, so implementors must
/// be `Sync + Send` and keep shared state in atomics or locks.
pub trait Agent: Sync + Send {
    /// Called from `Agent_OnLoad` when the agent is named on the command line.
    ///
    /// Return `JNI_OK` (0) on success. Anything else aborts JVM startup.
    fn on_load(&self, vm: *mut jni::JavaVM, options: &str) -> jni::jint;

    /// Called from `Agent_OnAttach` when the agent is loaded into a live VM.
    ///
    /// Defaults to [`Agent::on_load`].
    fn on_attach(&self, vm: *mut jni::JavaVM, options: &str) -> jni::jint {
        self.on_load(vm, options)
    }

    /// Called when the agent library is unloaded (JVM shutdown).
    fn on_unload(&self) {}

    /// Called when the VM is about to terminate.
    fn vm_death(&self, _jni: *mut jni::JNIEnv) {}

    /// Called when class bytecode is being loaded or redefined.
    ///
    /// Leaving `new_class_data` alone keeps the class as-is. `name` may be
    /// null. Requires `can_generate_all_class_hook_events` to see every class.
    fn class_file_load_hook(&self, _jni: *mut jni::JNIEnv, _class_being_redefined: jni::jclass,
                            _loader: jni::jobject, _name: *const c_char,
                            _protection_domain: jni::jobject, _class_data_len: jni::jint,
                            _class_data: *const c_uchar,
                            _new_class_data_len: *mut jni::jint,
                            _new_class_data: *mut *mut c_uchar) {}
}

// This holds the Agent instance so the static C functions can find it.
pub static GLOBAL_AGENT: OnceLock<Box<dyn Agent>> = OnceLock::new();

/// Returns the global agent, creating it on first use (called by the macro).
pub fn global_agent_or_init(init: impl FnOnce() -> Box<dyn Agent>) -> &'static dyn Agent {
    GLOBAL_AGENT.get_or_init(init).as_ref()
}

// A panic must not unwind into the JVM.
fn with_agent(event: &'static str, f: impl FnOnce(&dyn Agent)) {
    if let Some(agent) = GLOBAL_AGENT.get() {
        if catch_unwind(AssertUnwindSafe(|| f(agent.as_ref()))).is_err() {
            tracing::error!(event, "agent callback panicked");
        }
    }
}

unsafe extern "system" fn trampoline_vm_death(_env: *mut jvmti::jvmtiEnv, jni: *mut jni::JNIEnv) {
    with_agent("VMDeath", |agent| agent.vm_death(jni));
}

unsafe extern "system" fn trampoline_class_file_load_hook(
    _env: *mut jvmti::jvmtiEnv, jni: *mut jni::JNIEnv,
    class_being_redefined: jni::jclass, loader: jni::jobject, name: *const c_char,
    protection_domain: jni::jobject, class_data_len: jni::jint, class_data: *const c_uchar,
    new_class_data_len: *mut jni::jint, new_class_data: *mut *mut c_uchar
) {
    with_agent("ClassFileLoadHook", |agent| {
        agent.class_file_load_hook(jni, class_being_redefined, loader, name, protection_domain,
                                   class_data_len, class_data, new_class_data_len, new_class_data)
    });
}

/// Returns a `jvmtiEventCallbacks` struct routing `VMDeath` and
/// `ClassFileLoadHook` to the global [`Agent`].
///
/// Events still have to be enabled with
/// [`env::Jvmti::set_event_notification_mode`].
pub fn get_default_callbacks() -> jvmti::jvmtiEventCallbacks {
    let mut callbacks = jvmti::jvmtiEventCallbacks::default();
    callbacks.VMDeath = Some(trampoline_vm_death);
    callbacks.ClassFileLoadHook = Some(trampoline_class_file_load_hook);
    callbacks
}

/// Exports an agent type as a loadable JVMTI agent library.
///
/// Generates `Agent_OnLoad`, `Agent_OnAttach` and `Agent_OnUnload`. The agent
/// instance is created with `Default` on the first of those calls and lives
/// in [`GLOBAL_AGENT`]; later calls reuse it, so an agent that is both
/// started with `-agentpath` and attached again sees two calls on the same
/// instance.
///
/// The crate must be built as a `cdylib`.
#[macro_export]
macro_rules! export_agent {
    ($agent_type:ty) => {
        #[no_mangle]
        pub unsafe extern "system" fn Agent_OnLoad(
            vm: *mut $crate::sys::jni::JavaVM,
            options: *mut std::ffi::c_char,
            _reserved: *mut std::ffi::c_void,
        ) -> $crate::sys::jni::jint {
            let agent = $crate::global_agent_or_init(|| Box::new(<$agent_type>::default()));
            agent.on_load(vm, &$crate::__options_str(options))
        }

        #[no_mangle]
        pub unsafe extern "system" fn Agent_OnAttach(
            vm: *mut $crate::sys::jni::JavaVM,
            options: *mut std::ffi::c_char,
            _reserved: *mut std::ffi::c_void,
        ) -> $crate::sys::jni::jint {
            let agent = $crate::global_agent_or_init(|| Box::new(<$agent_type>::default()));
            agent.on_attach(vm, &$crate::__options_str(options))
        }

        #[no_mangle]
        pub unsafe extern "system" fn Agent_OnUnload(_vm: *mut $crate::sys::jni::JavaVM) {
            if let Some(agent) = $crate::GLOBAL_AGENT.get() {
                agent.on_unload();
            }
        }
    };
}

/// Options string passed to `Agent_OnLoad`/`Agent_OnAttach`; empty when null.
///
/// # Safety
/// `options` must be null or point to a NUL-terminated string.
#[doc(hidden)]
pub unsafe fn __options_str(options: *const c_char) -> String {
    if options.is_null() {
        String::new()
    } else {
        std::ffi::CStr::from_ptr(options).to_string_lossy().into_owned()
    }
}
