// class-dump-agent/src/sys/jvmti.rs
//
// The slice of the JVMTI (JVM Tool Interface) ABI this agent touches.
//
// The function table keeps the exact JDK layout: slots the agent never calls
// are declared as untyped padding so the named entries land at their real
// offsets. Slot numbers in comments are the 1-based numbers from jvmti.h.
//
// Reserved slots: 1, 105, 113, 117, 141

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::{c_char, c_uchar};
use crate::sys::jni::{jclass, jint, jobject, jthread, JNIEnv};

// --- Constants ---
pub const JVMTI_VERSION_1_2: jint = 0x30010200;

pub const JVMTI_EVENT_VM_DEATH: u32 = 51;
pub const JVMTI_EVENT_CLASS_FILE_LOAD_HOOK: u32 = 54;

pub const JVMTI_ENABLE: jint = 1;
pub const JVMTI_DISABLE: jint = 0;

// --- Error Codes ---

/// A `jvmtiError` as returned by every JVMTI function.
///
/// Kept as a transparent integer rather than a Rust enum: the JVM may return
/// codes this crate does not name, and those must not be undefined behavior.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct jvmtiError(pub u32);

impl jvmtiError {
    pub const NONE: jvmtiError = jvmtiError(0);
    pub const INVALID_THREAD: jvmtiError = jvmtiError(10);
    pub const INVALID_CLASS: jvmtiError = jvmtiError(21);
    pub const NOT_AVAILABLE: jvmtiError = jvmtiError(98);
    pub const MUST_POSSESS_CAPABILITY: jvmtiError = jvmtiError(99);
    pub const NULL_POINTER: jvmtiError = jvmtiError(100);
    pub const ABSENT_INFORMATION: jvmtiError = jvmtiError(101);
    pub const INVALID_EVENT_TYPE: jvmtiError = jvmtiError(102);
    pub const ILLEGAL_ARGUMENT: jvmtiError = jvmtiError(103);
    pub const OUT_OF_MEMORY: jvmtiError = jvmtiError(110);
    pub const ACCESS_DENIED: jvmtiError = jvmtiError(111);
    pub const WRONG_PHASE: jvmtiError = jvmtiError(112);
    pub const INTERNAL: jvmtiError = jvmtiError(113);
    pub const UNATTACHED_THREAD: jvmtiError = jvmtiError(115);
    pub const INVALID_ENVIRONMENT: jvmtiError = jvmtiError(116);

    /// The `JVMTI_ERROR_*` suffix for the codes listed above.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::NONE => "NONE",
            Self::INVALID_THREAD => "INVALID_THREAD",
            Self::INVALID_CLASS => "INVALID_CLASS",
            Self::NOT_AVAILABLE => "NOT_AVAILABLE",
            Self::MUST_POSSESS_CAPABILITY => "MUST_POSSESS_CAPABILITY",
            Self::NULL_POINTER => "NULL_POINTER",
            Self::ABSENT_INFORMATION => "ABSENT_INFORMATION",
            Self::INVALID_EVENT_TYPE => "INVALID_EVENT_TYPE",
            Self::ILLEGAL_ARGUMENT => "ILLEGAL_ARGUMENT",
            Self::OUT_OF_MEMORY => "OUT_OF_MEMORY",
            Self::ACCESS_DENIED => "ACCESS_DENIED",
            Self::WRONG_PHASE => "WRONG_PHASE",
            Self::INTERNAL => "INTERNAL",
            Self::UNATTACHED_THREAD => "UNATTACHED_THREAD",
            Self::INVALID_ENVIRONMENT => "INVALID_ENVIRONMENT",
            _ => return None,
        })
    }
}

// --- Capabilities ---
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct jvmtiCapabilities {
    bits: [u32; 4],
}

impl jvmtiCapabilities {
    // --- Helper Methods ---
    fn set_bit(&mut self, bit_offset: usize, value: bool) {
        let word_index = bit_offset / 32;
        let bit_index = bit_offset % 32;
        if value {
            self.bits[word_index] |= 1 << bit_index;
        } else {
            self.bits[word_index] &= !(1 << bit_index);
        }
    }

    fn get_bit(&self, bit_offset: usize) -> bool {
        let word_index = bit_offset / 32;
        let bit_index = bit_offset % 32;
        (self.bits[word_index] & (1 << bit_index)) != 0
    }

    // [26]
    pub fn set_can_generate_all_class_hook_events(&mut self, v: bool) { self.set_bit(26, v); }
    pub fn can_generate_all_class_hook_events(&self) -> bool { self.get_bit(26) }

    // [42] (Java 9+)
    pub fn set_can_generate_early_class_hook_events(&mut self, v: bool) { self.set_bit(42, v); }
    pub fn can_generate_early_class_hook_events(&self) -> bool { self.get_bit(42) }
}

// --- Function Types ---

// SetEventNotificationMode is declared with a trailing `...` in jvmti.h.
// Variadic functions always use the C convention, even where JNICALL is stdcall.
pub type JvmtiSetEventNotificationModeFn =
    unsafe extern "C" fn(env: *mut jvmtiEnv, mode: jint, event_type: u32, event_thread: jthread, ...) -> jvmtiError;
pub type JvmtiDeallocateFn = unsafe extern "system" fn(env: *mut jvmtiEnv, mem: *mut c_uchar) -> jvmtiError;
pub type JvmtiSetEventCallbacksFn = unsafe extern "system" fn(env: *mut jvmtiEnv, callbacks: *const jvmtiEventCallbacks, size_of_callbacks: jint) -> jvmtiError;
pub type JvmtiGetErrorNameFn = unsafe extern "system" fn(env: *mut jvmtiEnv, error: jvmtiError, name_ptr: *mut *mut c_char) -> jvmtiError;
pub type JvmtiGetPotentialCapabilitiesFn = unsafe extern "system" fn(env: *mut jvmtiEnv, capabilities_ptr: *mut jvmtiCapabilities) -> jvmtiError;
pub type JvmtiAddCapabilitiesFn = unsafe extern "system" fn(env: *mut jvmtiEnv, capabilities_ptr: *const jvmtiCapabilities) -> jvmtiError;

// --- Event Types ---

pub type JvmtiVMDeathFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv
);

pub type JvmtiClassFileLoadHookFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    class_being_redefined: jclass,
    loader: jobject,
    name: *const c_char,
    protection_domain: jobject,
    class_data_len: jint,
    class_data: *const c_uchar,
    new_class_data_len: *mut jint,
    new_class_data: *mut *mut c_uchar
);

/// A table slot this crate never calls. Same size as a function pointer.
pub type UnusedFn = Option<unsafe extern "system" fn()>;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct jvmtiInterface_1_ {
    /*   1:  RESERVED */
    pub reserved1: UnusedFn,
    /*   2: Set Event Notification Mode */
    pub SetEventNotificationMode: Option<JvmtiSetEventNotificationModeFn>,
    /*   3 - 46: threads, frames, locals, raw monitors, watches, Allocate */
    pub unused3_46: [UnusedFn; 44],
    /*   47: Deallocate */
    pub Deallocate: Option<JvmtiDeallocateFn>,
    /*   48 - 121: classes, methods, heap, stack traces, JNI table */
    pub unused48_121: [UnusedFn; 74],
    /*   122: Set Event Callbacks */
    pub SetEventCallbacks: Option<JvmtiSetEventCallbacksFn>,
    /*   123 - 127: generate events, extensions, DisposeEnvironment */
    pub unused123_127: [UnusedFn; 5],
    /*   128: Get Error Name */
    pub GetErrorName: Option<JvmtiGetErrorNameFn>,
    /*   129 - 139: jlocation format, system properties, GetPhase, timers */
    pub unused129_139: [UnusedFn; 11],
    /*   140: Get Potential Capabilities */
    pub GetPotentialCapabilities: Option<JvmtiGetPotentialCapabilitiesFn>,
    /*   141:  RESERVED */
    pub reserved141: UnusedFn,
    /*   142: Add Capabilities */
    pub AddCapabilities: Option<JvmtiAddCapabilitiesFn>,
    /*   143 - 156: relinquish, class search, retransform, heap sampling */
    pub unused143_156: [UnusedFn; 14],
}

impl Default for jvmtiInterface_1_ {
    fn default() -> Self {
        Self {
            reserved1: None,
            SetEventNotificationMode: None,
            unused3_46: [None; 44],
            Deallocate: None,
            unused48_121: [None; 74],
            SetEventCallbacks: None,
            unused123_127: [None; 5],
            GetErrorName: None,
            unused129_139: [None; 11],
            GetPotentialCapabilities: None,
            reserved141: None,
            AddCapabilities: None,
            unused143_156: [None; 14],
        }
    }
}

#[repr(C)]
pub struct jvmtiEnv {
    pub functions: *const jvmtiInterface_1_,
}

/// Event callback table. Slot `n` holds the handler for event `50 + n`.
///
/// Only the slots up to ClassFileLoadHook are named; the remainder (events 55 through 88,
/// reserved numbers included) stays null.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct jvmtiEventCallbacks {
    /* 50 */ pub VMInit: UnusedFn,
    /* 51 */ pub VMDeath: Option<JvmtiVMDeathFn>,
    /* 52 */ pub ThreadStart: UnusedFn,
    /* 53 */ pub ThreadEnd: UnusedFn,
    /* 54 */ pub ClassFileLoadHook: Option<JvmtiClassFileLoadHookFn>,
    /* 55 - 88 */ pub unused55_88: [UnusedFn; 34],
}

impl Default for jvmtiEventCallbacks {
    fn default() -> Self {
        Self {
            VMInit: None,
            VMDeath: None,
            ThreadStart: None,
            ThreadEnd: None,
            ClassFileLoadHook: None,
            unused55_88: [None; 34],
        }
    }
}
