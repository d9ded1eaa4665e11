//! The class dump agent itself.
//!
//! `Agent_OnLoad` and `Agent_OnAttach` both end up in
//! [`ClassDumpAgent::start`]. The first call arms the agent, whatever its
//! outcome; later calls are ignored. Once armed with a usable configuration
//! the agent installs its [`Dumper`] and asks the JVM for `ClassFileLoadHook`
//! events, then dumps every accepted class until the VM dies.

use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::{c_char, c_uchar};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing::{debug, error, info, warn};

use crate::classfile;
use crate::config::{AgentConfig, ClassFilter};
use crate::dump::Dumper;
use crate::env::Jvmti;
use crate::error::{ActivationError, JvmtiError};
use crate::logging;
use crate::sys::{jni, jvmti};
use crate::{export_agent, get_default_callbacks, Agent};

/// The facility the dump hook is registered with.
///
/// [`Jvmti`] is the real one; tests substitute their own.
pub trait ClassHookHost {
    fn register_class_hook(&self) -> Result<(), JvmtiError>;
}

impl ClassHookHost for Jvmti {
    fn register_class_hook(&self) -> Result<(), JvmtiError> {
        // Early class hook events only exist from JDK 9 and only during
        // OnLoad; ask for them when the VM can give them.
        let early = match self.get_potential_capabilities() {
            Ok(potential) => potential.can_generate_early_class_hook_events(),
            Err(e) => {
                debug!(error = %e, "can't query potential capabilities");
                false
            }
        };

        self.add_capabilities_with(|caps| {
            caps.set_can_generate_all_class_hook_events(true);
            caps.set_can_generate_early_class_hook_events(early);
        })?;
        self.set_event_callbacks(get_default_callbacks())?;
        self.enable_events_global(&[
            jvmti::JVMTI_EVENT_CLASS_FILE_LOAD_HOOK,
            jvmti::JVMTI_EVENT_VM_DEATH,
        ])
    }
}

#[derive(Debug, Default)]
pub struct ClassDumpAgent {
    armed: AtomicBool,
    dumper: OnceLock<Dumper>,
}

impl ClassDumpAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `start`/`activate` has been called, successfully or not.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// The installed dumper, if activation got that far.
    pub fn dumper(&self) -> Option<&Dumper> {
        self.dumper.get()
    }

    /// Entry point shared by `Agent_OnLoad` and `Agent_OnAttach`.
    ///
    /// Always returns `JNI_OK`: a diagnostic agent must not stop the JVM from
    /// starting. The guard is armed before `GetEnv`, so a VM without JVMTI
    /// also counts as the one activation.
    pub fn start(&self, vm: *mut jni::JavaVM, options: &str) -> jni::jint {
        logging::init_logging();

        if let Err(e) = self.arm(options) {
            warn!("{e}");
            return jni::JNI_OK;
        }

        let jvmti = match Jvmti::new(vm) {
            Ok(env) => env,
            Err(e) => {
                error!(error = %e, "can't get a JVMTI environment, classes will not be dumped");
                return jni::JNI_OK;
            }
        };

        if let Err(e) = self.configure(options, &jvmti) {
            error!("{e}; classes will not be dumped");
        }
        jni::JNI_OK
    }

    /// Arm the agent, validate `options` and register with `host`.
    pub fn activate(&self, options: &str, host: &dyn ClassHookHost) -> Result<(), ActivationError> {
        self.arm(options)?;
        self.configure(options, host)
    }

    fn arm(&self, options: &str) -> Result<(), ActivationError> {
        self.armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ActivationError::AlreadyArmed(options.to_string()))
    }

    // The dumper is installed before the hook is registered so that no
    // event arrives to an empty agent.
    fn configure(&self, options: &str, host: &dyn ClassHookHost) -> Result<(), ActivationError> {
        let config = AgentConfig::parse(options)?;
        config.prepare_output_dir()?;

        let root = config.output_dir.clone();
        let filter = config.filter.clone();
        if self.dumper.set(Dumper::from_config(config)).is_err() {
            // Unreachable while `armed` guards this path.
            return Err(ActivationError::AlreadyArmed(options.to_string()));
        }

        host.register_class_hook()?;

        match &filter {
            ClassFilter::Any => info!(dir = %root.display(), "dumping all loaded classes"),
            ClassFilter::Prefix(prefix) => {
                info!(dir = %root.display(), filter = %prefix, "dumping loaded classes matching filter")
            }
        }
        Ok(())
    }
}

impl Agent for ClassDumpAgent {
    fn on_load(&self, vm: *mut jni::JavaVM, options: &str) -> jni::jint {
        self.start(vm, options)
    }

    fn on_attach(&self, vm: *mut jni::JavaVM, options: &str) -> jni::jint {
        self.start(vm, options)
    }

    fn vm_death(&self, _jni: *mut jni::JNIEnv) {
        if let Some(dumper) = self.dumper() {
            let stats = dumper.stats();
            info!(
                written = stats.written,
                filtered = stats.filtered,
                failed = stats.failed,
                dir = %dumper.root().display(),
                "class dump finished"
            );
        }
    }

    fn class_file_load_hook(
        &self,
        _jni: *mut jni::JNIEnv,
        _class_being_redefined: jni::jclass,
        _loader: jni::jobject,
        name: *const c_char,
        _protection_domain: jni::jobject,
        class_data_len: jni::jint,
        class_data: *const c_uchar,
        _new_class_data_len: *mut jni::jint,
        _new_class_data: *mut *mut c_uchar,
    ) {
        // new_class_data stays null: the JVM keeps the original bytes.
        let Some(dumper) = self.dumper() else {
            return;
        };

        let Some(data) = (unsafe { class_bytes(class_data, class_data_len) }) else {
            debug!(len = class_data_len, "class file load hook without class data");
            return;
        };

        match unsafe { hook_class_name(name, data) } {
            Some(class_name) => {
                dumper.transform(&class_name, data);
            }
            None => debug!(bytes = data.len(), "skipping class with no resolvable name"),
        }
    }
}

/// View the hook's class data as a slice. `None` for a null pointer or a
/// negative length.
///
/// # Safety
/// A non-null `data` must point to `len` readable bytes for the duration of
/// the callback.
pub unsafe fn class_bytes<'a>(data: *const c_uchar, len: jni::jint) -> Option<&'a [u8]> {
    if data.is_null() || len < 0 {
        return None;
    }
    Some(std::slice::from_raw_parts(data, len as usize))
}

/// The name the JVM passed, or failing that, `this_class` read from the
/// class bytes. Both are modified UTF-8 and are decoded as such, so
/// supplementary characters survive.
///
/// # Safety
/// `name` must be null or a NUL-terminated string.
pub unsafe fn hook_class_name<'a>(name: *const c_char, data: &[u8]) -> Option<Cow<'a, str>> {
    if !name.is_null() {
        match cesu8::from_java_cesu8(CStr::from_ptr(name).to_bytes()) {
            Ok(decoded) => return Some(decoded),
            Err(_) => debug!("class name from the JVM is not modified UTF-8"),
        }
    }
    match classfile::class_name(data) {
        Ok(n) => Some(Cow::Owned(n)),
        Err(e) => {
            debug!(error = %e, "can't read class name from class data");
            None
        }
    }
}

export_agent!(ClassDumpAgent);
