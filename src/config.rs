//! Activation argument parsing.
//!
//! The agent takes a single option string, `<directory>` or
//! `<directory>?<filter>`:
//!
//! ```text
//! java -agentpath:./libclass_dump_agent.so=/tmp/classes?com.example MyApp
//! ```
//!
//! The split happens on the first `?`, so the filter itself may contain `?`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

/// Which classes get dumped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassFilter {
    #[default]
    Any,
    /// Dotted package prefix, e.g. `com.example`. Matched as a plain string
    /// prefix, so `com.example` also admits `com.examples.Foo`.
    Prefix(String),
}

impl ClassFilter {
    /// Whether `class_name` passes, after normalizing `/` to `.`.
    pub fn accepts(&self, class_name: &str) -> bool {
        match self {
            ClassFilter::Any => true,
            ClassFilter::Prefix(prefix) => {
                let dotted = class_name.replace('/', ".");
                dotted.starts_with(prefix.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub output_dir: PathBuf,
    pub filter: ClassFilter,
}

impl AgentConfig {
    /// Split the activation argument into directory and filter.
    ///
    /// Does not touch the filesystem; see [`AgentConfig::prepare_output_dir`].
    pub fn parse(options: &str) -> Result<Self, ConfigError> {
        let (dir, filter) = match options.split_once('?') {
            Some((dir, filter)) => (dir, ClassFilter::Prefix(filter.to_string())),
            None => (options, ClassFilter::Any),
        };

        if dir.is_empty() {
            return Err(ConfigError::MissingOutputDir);
        }

        Ok(Self {
            output_dir: PathBuf::from(dir),
            filter,
        })
    }

    /// Create the output directory if needed and check that it accepts files.
    pub fn prepare_output_dir(&self) -> Result<(), ConfigError> {
        create_dir_all(&self.output_dir)?;
        check_writable(&self.output_dir)
    }
}

fn create_dir_all(dir: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

// The probe file is removed when it drops.
fn check_writable(dir: &Path) -> Result<(), ConfigError> {
    let probe = tempfile::Builder::new()
        .prefix(".class-dump-probe")
        .tempfile_in(dir)
        .map_err(|source| ConfigError::NotWritable {
            path: dir.to_path_buf(),
            source,
        })?;
    debug!(probe = %probe.path().display(), "output directory is writable");
    Ok(())
}
