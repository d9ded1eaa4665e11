//! Error types for the class dump agent.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::sys::jni::jint;
use crate::sys::jvmti::jvmtiError;

/// Why the activation argument could not be turned into a usable output directory.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no output directory given, use -agentpath:<lib>=/tmp/classes[?com.example] for instance")]
    MissingOutputDir,

    #[error("can't create output directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("output directory {} is not writable: {source}", path.display())]
    NotWritable { path: PathBuf, source: io::Error },
}

/// Failure to write a single class file.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("class name {0:?} does not map to a file path")]
    InvalidClassName(String),

    #[error("can't create {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("can't write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// A failed JVMTI or JavaVM call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JvmtiError {
    #[error("GetEnv failed with JNI code {0}")]
    GetEnv(jint),

    #[error("{function} is missing from the JVMTI function table")]
    Unsupported { function: &'static str },

    #[error("{function} failed: JVMTI_ERROR_{name} ({})", code.0)]
    Call {
        function: &'static str,
        code: jvmtiError,
        name: String,
    },
}

impl JvmtiError {
    /// The raw JVMTI error code, when the JVM returned one.
    pub fn code(&self) -> Option<jvmtiError> {
        match self {
            JvmtiError::Call { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Why a call to `ClassDumpAgent::activate` left the agent inert.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("agent already started, ignoring options {0:?}")]
    AlreadyArmed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("can't register the class file load hook: {0}")]
    Host(#[from] JvmtiError),
}

/// Failure to read the class header out of raw class bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("unexpected end of class data")]
    UnexpectedEof,

    #[error("invalid magic: {0:#x}")]
    InvalidMagic(u32),

    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),

    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),

    #[error("constant pool entry {0} is not valid modified UTF-8")]
    InvalidUtf8(u16),
}
