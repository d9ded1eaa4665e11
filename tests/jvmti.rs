//! Drives `Jvmti` against a hand-built function table.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::os::raw::{c_char, c_uchar};
use std::ptr;

use class_dump_agent::agent::{ClassDumpAgent, ClassHookHost};
use class_dump_agent::env::Jvmti;
use class_dump_agent::error::JvmtiError;
use class_dump_agent::sys::jni::{self, jint, jthread, JavaVM, JNIInvokeInterface_};
use class_dump_agent::sys::jvmti::{self as sys, jvmtiCapabilities, jvmtiEnv, jvmtiError, jvmtiEventCallbacks, jvmtiInterface_1_};

thread_local! {
    static POTENTIAL_EARLY: Cell<bool> = const { Cell::new(false) };
    static ADD_CAPS_RESULT: Cell<jvmtiError> = const { Cell::new(jvmtiError::NONE) };
    static ADDED_CAPS: RefCell<Vec<jvmtiCapabilities>> = const { RefCell::new(Vec::new()) };
    static CALLBACKS: RefCell<Option<(jvmtiEventCallbacks, jint)>> = const { RefCell::new(None) };
    static MODES: RefCell<Vec<(jint, u32, bool)>> = const { RefCell::new(Vec::new()) };
    static DEALLOCATED: Cell<usize> = const { Cell::new(0) };
    static GET_ENV_CALLS: Cell<usize> = const { Cell::new(0) };
}

fn reset() {
    POTENTIAL_EARLY.with(|c| c.set(false));
    ADD_CAPS_RESULT.with(|c| c.set(jvmtiError::NONE));
    ADDED_CAPS.with(|c| c.borrow_mut().clear());
    CALLBACKS.with(|c| *c.borrow_mut() = None);
    MODES.with(|c| c.borrow_mut().clear());
    DEALLOCATED.with(|c| c.set(0));
}

static NOT_AVAILABLE_NAME: &[u8] = b"JVMTI_ERROR_NOT_AVAILABLE\0";

unsafe extern "system" fn fake_get_potential_capabilities(
    _env: *mut jvmtiEnv,
    caps: *mut jvmtiCapabilities,
) -> jvmtiError {
    let mut potential = jvmtiCapabilities::default();
    potential.set_can_generate_all_class_hook_events(true);
    potential.set_can_generate_early_class_hook_events(POTENTIAL_EARLY.with(Cell::get));
    *caps = potential;
    jvmtiError::NONE
}

unsafe extern "system" fn fake_add_capabilities(
    _env: *mut jvmtiEnv,
    caps: *const jvmtiCapabilities,
) -> jvmtiError {
    ADDED_CAPS.with(|c| c.borrow_mut().push(*caps));
    ADD_CAPS_RESULT.with(Cell::get)
}

unsafe extern "system" fn fake_set_event_callbacks(
    _env: *mut jvmtiEnv,
    callbacks: *const jvmtiEventCallbacks,
    size: jint,
) -> jvmtiError {
    CALLBACKS.with(|c| *c.borrow_mut() = Some((*callbacks, size)));
    jvmtiError::NONE
}

// Called through the variadic slot type; with no trailing arguments the
// register assignment is the same as for this fixed-arity function.
unsafe extern "C" fn fake_set_event_notification_mode(
    _env: *mut jvmtiEnv,
    mode: jint,
    event: u32,
    thread: jthread,
) -> jvmtiError {
    MODES.with(|c| c.borrow_mut().push((mode, event, thread.is_null())));
    jvmtiError::NONE
}

unsafe extern "system" fn fake_get_error_name(
    _env: *mut jvmtiEnv,
    _error: jvmtiError,
    name: *mut *mut c_char,
) -> jvmtiError {
    *name = NOT_AVAILABLE_NAME.as_ptr() as *mut c_char;
    jvmtiError::NONE
}

unsafe extern "system" fn fake_deallocate(_env: *mut jvmtiEnv, _mem: *mut c_uchar) -> jvmtiError {
    DEALLOCATED.with(|c| c.set(c.get() + 1));
    jvmtiError::NONE
}

fn full_table() -> jvmtiInterface_1_ {
    type FixedSetMode =
        unsafe extern "C" fn(*mut jvmtiEnv, jint, u32, jthread) -> jvmtiError;
    let set_mode: sys::JvmtiSetEventNotificationModeFn = unsafe {
        std::mem::transmute::<FixedSetMode, sys::JvmtiSetEventNotificationModeFn>(
            fake_set_event_notification_mode,
        )
    };

    jvmtiInterface_1_ {
        SetEventNotificationMode: Some(set_mode),
        Deallocate: Some(fake_deallocate),
        SetEventCallbacks: Some(fake_set_event_callbacks),
        GetErrorName: Some(fake_get_error_name),
        GetPotentialCapabilities: Some(fake_get_potential_capabilities),
        AddCapabilities: Some(fake_add_capabilities),
        ..Default::default()
    }
}

/// Owns the table and env the wrapper points into.
struct FakeEnv {
    _table: Box<jvmtiInterface_1_>,
    env: Box<jvmtiEnv>,
}

impl FakeEnv {
    fn new(table: jvmtiInterface_1_) -> Self {
        reset();
        let table = Box::new(table);
        let env = Box::new(jvmtiEnv { functions: &*table });
        Self { _table: table, env }
    }

    fn jvmti(&mut self) -> Jvmti {
        unsafe { Jvmti::from_raw(&mut *self.env) }
    }
}

#[test]
fn registers_capabilities_callbacks_and_events() {
    let mut fake = FakeEnv::new(full_table());
    POTENTIAL_EARLY.with(|c| c.set(true));

    fake.jvmti().register_class_hook().unwrap();

    let added = ADDED_CAPS.with(|c| c.borrow().clone());
    assert_eq!(added.len(), 1);
    assert!(added[0].can_generate_all_class_hook_events());
    assert!(added[0].can_generate_early_class_hook_events());

    let (callbacks, size) = CALLBACKS.with(|c| c.borrow().unwrap());
    assert_eq!(size as usize, std::mem::size_of::<jvmtiEventCallbacks>());
    assert!(callbacks.ClassFileLoadHook.is_some());
    assert!(callbacks.VMDeath.is_some());
    assert!(callbacks.VMInit.is_none());

    let modes = MODES.with(|c| c.borrow().clone());
    assert_eq!(
        modes,
        vec![
            (sys::JVMTI_ENABLE, sys::JVMTI_EVENT_CLASS_FILE_LOAD_HOOK, true),
            (sys::JVMTI_ENABLE, sys::JVMTI_EVENT_VM_DEATH, true),
        ]
    );
}

#[test]
fn early_hook_capability_is_only_requested_when_available() {
    let mut fake = FakeEnv::new(full_table());

    fake.jvmti().register_class_hook().unwrap();

    let added = ADDED_CAPS.with(|c| c.borrow().clone());
    assert!(added[0].can_generate_all_class_hook_events());
    assert!(!added[0].can_generate_early_class_hook_events());
}

#[test]
fn missing_potential_capabilities_is_not_fatal() {
    let mut fake = FakeEnv::new(jvmtiInterface_1_ {
        GetPotentialCapabilities: None,
        ..full_table()
    });

    fake.jvmti().register_class_hook().unwrap();

    let added = ADDED_CAPS.with(|c| c.borrow().clone());
    assert!(!added[0].can_generate_early_class_hook_events());
    assert_eq!(MODES.with(|c| c.borrow().len()), 2);
}

#[test]
fn capability_failure_stops_registration() {
    let mut fake = FakeEnv::new(full_table());
    ADD_CAPS_RESULT.with(|c| c.set(jvmtiError::NOT_AVAILABLE));

    let err = fake.jvmti().register_class_hook().unwrap_err();

    assert_eq!(
        err,
        JvmtiError::Call {
            function: "AddCapabilities",
            code: jvmtiError::NOT_AVAILABLE,
            name: "NOT_AVAILABLE".to_string(),
        }
    );
    assert_eq!(err.to_string(), "AddCapabilities failed: JVMTI_ERROR_NOT_AVAILABLE (98)");
    assert!(CALLBACKS.with(|c| c.borrow().is_none()));
    assert!(MODES.with(|c| c.borrow().is_empty()));
    // The name string from GetErrorName is handed back to the VM.
    assert_eq!(DEALLOCATED.with(Cell::get), 1);
}

#[test]
fn error_names_fall_back_without_get_error_name() {
    let mut fake = FakeEnv::new(jvmtiInterface_1_ {
        GetErrorName: None,
        ..full_table()
    });
    let jvmti = fake.jvmti();

    assert_eq!(jvmti.error_name(jvmtiError::WRONG_PHASE), "WRONG_PHASE");
    assert_eq!(jvmti.error_name(jvmtiError(7)), "UNKNOWN_7");
    assert_eq!(DEALLOCATED.with(Cell::get), 0);
}

#[test]
fn empty_slot_is_reported_as_unsupported() {
    let mut fake = FakeEnv::new(jvmtiInterface_1_::default());
    let jvmti = fake.jvmti();

    assert_eq!(
        jvmti.get_potential_capabilities(),
        Err(JvmtiError::Unsupported { function: "GetPotentialCapabilities" })
    );
    assert_eq!(
        jvmti.register_class_hook(),
        Err(JvmtiError::Unsupported { function: "AddCapabilities" })
    );
}

#[test]
fn deallocate_ignores_null() {
    let mut fake = FakeEnv::new(full_table());
    fake.jvmti().deallocate(ptr::null_mut()).unwrap();
    assert_eq!(DEALLOCATED.with(Cell::get), 0);
}

// --- JavaVM::GetEnv ---

static mut FAKE_ENV: jvmtiEnv = jvmtiEnv { functions: ptr::null() };

unsafe extern "system" fn vm_unused(_vm: *mut JavaVM) -> jint {
    jni::JNI_ERR
}

unsafe extern "system" fn vm_unused_attach(
    _vm: *mut JavaVM,
    _penv: *mut *mut c_void,
    _args: *mut c_void,
) -> jint {
    jni::JNI_ERR
}

unsafe extern "system" fn get_env_ok(_vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint {
    if version != sys::JVMTI_VERSION_1_2 {
        return jni::JNI_EVERSION;
    }
    *penv = ptr::addr_of_mut!(FAKE_ENV) as *mut c_void;
    jni::JNI_OK
}

unsafe extern "system" fn get_env_old_vm(_vm: *mut JavaVM, _penv: *mut *mut c_void, _version: jint) -> jint {
    GET_ENV_CALLS.with(|c| c.set(c.get() + 1));
    jni::JNI_EVERSION
}

fn invoke_interface(
    get_env: unsafe extern "system" fn(*mut JavaVM, *mut *mut c_void, jint) -> jint,
) -> JNIInvokeInterface_ {
    JNIInvokeInterface_ {
        reserved0: ptr::null_mut(),
        reserved1: ptr::null_mut(),
        reserved2: ptr::null_mut(),
        DestroyJavaVM: vm_unused,
        AttachCurrentThread: vm_unused_attach,
        DetachCurrentThread: vm_unused,
        GetEnv: get_env,
        AttachCurrentThreadAsDaemon: vm_unused_attach,
    }
}

#[test]
fn get_env_returns_the_jvmti_environment() {
    let iface = invoke_interface(get_env_ok);
    let mut vm: JavaVM = &iface;

    let jvmti = Jvmti::new(&mut vm).unwrap();

    assert_eq!(jvmti.raw(), ptr::addr_of_mut!(FAKE_ENV));
}

#[test]
fn get_env_failure_carries_the_jni_code() {
    let iface = invoke_interface(get_env_old_vm);
    let mut vm: JavaVM = &iface;

    assert_eq!(
        Jvmti::new(&mut vm).err(),
        Some(JvmtiError::GetEnv(jni::JNI_EVERSION))
    );
}

#[test]
fn start_without_jvmti_still_arms_the_agent() {
    let tmp = tempfile::tempdir().unwrap();
    let options = tmp.path().to_str().unwrap();
    let iface = invoke_interface(get_env_old_vm);
    let mut vm: JavaVM = &iface;
    let agent = ClassDumpAgent::new();
    GET_ENV_CALLS.with(|c| c.set(0));

    assert_eq!(agent.start(&mut vm, options), jni::JNI_OK);
    assert!(agent.is_armed());
    assert!(agent.dumper().is_none());

    // A later attach is ignored before it reaches GetEnv.
    assert_eq!(agent.start(&mut vm, options), jni::JNI_OK);
    assert_eq!(GET_ENV_CALLS.with(Cell::get), 1);
    assert!(agent.dumper().is_none());
}
