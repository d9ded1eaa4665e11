// class-dump-agent/src/jvmti_wrapper.rs
use crate::error::JvmtiError;
use crate::sys::jni;
use crate::sys::jvmti;
use std::ffi::CStr;
use std::ptr;

/// A safe wrapper around the raw JVMTI Environment pointer.
pub struct Jvmti {
    env: *mut jvmti::jvmtiEnv,
}

// Looks up a function in the JVMTI table, failing if the slot is null.
macro_rules! jvmti_fn {
    ($self:ident, $name:ident) => {
        $self.table().$name.ok_or(JvmtiError::Unsupported {
            function: stringify!($name),
        })?
    };
}

impl Jvmti {
    /// Connects to the JVM and retrieves the JVMTI environment.
    pub fn new(vm: *mut jni::JavaVM) -> Result<Self, JvmtiError> {
        let mut env_ptr: *mut std::ffi::c_void = ptr::null_mut();

        unsafe {
            // vm: *mut JavaVM = *mut *const JNIInvokeInterface_
            // **vm: JNIInvokeInterface_ (vtable itself)
            let get_env_fn = (**vm).GetEnv;
            let res = get_env_fn(vm, &mut env_ptr, jvmti::JVMTI_VERSION_1_2);

            if res != jni::JNI_OK {
                return Err(JvmtiError::GetEnv(res));
            }
        }

        Ok(Jvmti {
            env: env_ptr as *mut jvmti::jvmtiEnv,
        })
    }

    /// Create a Jvmti wrapper from a raw jvmtiEnv pointer
    ///
    /// # Safety
    /// The pointer must be a live JVMTI environment for as long as the
    /// wrapper is used.
    pub unsafe fn from_raw(env: *mut jvmti::jvmtiEnv) -> Self {
        Jvmti { env }
    }

    /// Get the raw jvmtiEnv pointer
    pub fn raw(&self) -> *mut jvmti::jvmtiEnv {
        self.env
    }

    fn table(&self) -> &jvmti::jvmtiInterface_1_ {
        // The JVM keeps the function table alive for the lifetime of the env.
        unsafe { &*(*self.env).functions }
    }

    fn check(&self, function: &'static str, err: jvmti::jvmtiError) -> Result<(), JvmtiError> {
        if err == jvmti::jvmtiError::NONE {
            return Ok(());
        }
        Err(JvmtiError::Call {
            function,
            code: err,
            name: self.error_name(err),
        })
    }

    /// `JVMTI_ERROR_*` suffix for `err`, asked of the JVM first and falling
    /// back to the names this crate knows.
    pub fn error_name(&self, err: jvmti::jvmtiError) -> String {
        let from_vm = self.table().GetErrorName.and_then(|get_error_name| unsafe {
            let mut name_ptr: *mut std::os::raw::c_char = ptr::null_mut();
            if get_error_name(self.env, err, &mut name_ptr) != jvmti::jvmtiError::NONE || name_ptr.is_null() {
                return None;
            }
            let name = CStr::from_ptr(name_ptr).to_string_lossy().into_owned();
            let _ = self.deallocate(name_ptr as *mut u8);
            Some(name)
        });

        match from_vm {
            Some(name) => name.trim_start_matches("JVMTI_ERROR_").to_string(),
            None => err.name().map(str::to_string).unwrap_or_else(|| format!("UNKNOWN_{}", err.0)),
        }
    }

    pub fn deallocate(&self, mem: *mut u8) -> Result<(), JvmtiError> {
        if mem.is_null() {
            return Ok(());
        }
        let deallocate_fn = jvmti_fn!(self, Deallocate);
        let err = unsafe { deallocate_fn(self.env, mem) };
        // Not routed through check(): error_name() deallocates too.
        if err != jvmti::jvmtiError::NONE {
            return Err(JvmtiError::Call {
                function: "Deallocate",
                code: err,
                name: err.name().unwrap_or("UNKNOWN").to_string(),
            });
        }
        Ok(())
    }

    pub fn get_potential_capabilities(&self) -> Result<jvmti::jvmtiCapabilities, JvmtiError> {
        let get_caps_fn = jvmti_fn!(self, GetPotentialCapabilities);
        let mut caps = jvmti::jvmtiCapabilities::default();
        let err = unsafe { get_caps_fn(self.env, &mut caps) };
        self.check("GetPotentialCapabilities", err)?;
        Ok(caps)
    }

    pub fn add_capabilities(&self, new_caps: &jvmti::jvmtiCapabilities) -> Result<(), JvmtiError> {
        let add_caps_fn = jvmti_fn!(self, AddCapabilities);
        let err = unsafe { add_caps_fn(self.env, new_caps) };
        self.check("AddCapabilities", err)
    }

    /// Build a capability set in a closure and add it.
    pub fn add_capabilities_with(
        &self,
        configure: impl FnOnce(&mut jvmti::jvmtiCapabilities),
    ) -> Result<(), JvmtiError> {
        let mut caps = jvmti::jvmtiCapabilities::default();
        configure(&mut caps);
        self.add_capabilities(&caps)
    }

    pub fn set_event_callbacks(&self, callbacks: jvmti::jvmtiEventCallbacks) -> Result<(), JvmtiError> {
        let set_callbacks_fn = jvmti_fn!(self, SetEventCallbacks);
        let size = std::mem::size_of::<jvmti::jvmtiEventCallbacks>() as jni::jint;
        let err = unsafe { set_callbacks_fn(self.env, &callbacks, size) };
        self.check("SetEventCallbacks", err)
    }

    pub fn set_event_notification_mode(&self, enable: bool, event_type: u32, thread: jni::jthread) -> Result<(), JvmtiError> {
        let set_mode_fn = jvmti_fn!(self, SetEventNotificationMode);
        let mode = if enable { jvmti::JVMTI_ENABLE } else { jvmti::JVMTI_DISABLE };

        // thread can be null (all threads)
        let err = unsafe { set_mode_fn(self.env, mode, event_type, thread) };
        self.check("SetEventNotificationMode", err)
    }

    /// Enable each event for all threads, stopping at the first failure.
    pub fn enable_events_global(&self, events: &[u32]) -> Result<(), JvmtiError> {
        for &event in events {
            self.set_event_notification_mode(true, event, ptr::null_mut())?;
        }
        Ok(())
    }
}
