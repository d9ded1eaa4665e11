//! Writing class bytes to disk.
//!
//! [`Dumper`] owns the output root and the filter. Each call to
//! [`Dumper::transform`] writes at most one file and hands the input slice
//! back unchanged, whatever happened on disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use crate::config::{AgentConfig, ClassFilter};
use crate::error::DumpError;

const CLASS_SUFFIX: &str = ".class";

/// What a single dump request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    Written(PathBuf),
    Filtered,
}

/// Counters reported when the VM shuts down.
#[derive(Debug, Default)]
pub struct DumpStats {
    written: AtomicU64,
    filtered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpStatsSnapshot {
    pub written: u64,
    pub filtered: u64,
    pub failed: u64,
}

impl DumpStats {
    pub fn snapshot(&self) -> DumpStatsSnapshot {
        DumpStatsSnapshot {
            written: self.written.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct Dumper {
    root: PathBuf,
    filter: ClassFilter,
    stats: DumpStats,
}

impl Dumper {
    pub fn new(root: impl Into<PathBuf>, filter: ClassFilter) -> Self {
        Self {
            root: root.into(),
            filter,
            stats: DumpStats::default(),
        }
    }

    pub fn from_config(config: AgentConfig) -> Self {
        Self::new(config.output_dir, config.filter)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &ClassFilter {
        &self.filter
    }

    pub fn stats(&self) -> DumpStatsSnapshot {
        self.stats.snapshot()
    }

    /// The hook body: dump if the filter allows, log and swallow any error,
    /// and return `class_data` untouched.
    pub fn transform<'a>(&self, class_name: &str, class_data: &'a [u8]) -> &'a [u8] {
        match self.dump(class_name, class_data) {
            Ok(DumpOutcome::Written(path)) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
                trace!(class = class_name, path = %path.display(), bytes = class_data.len(), "dumped");
            }
            Ok(DumpOutcome::Filtered) => {
                self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(class = class_name, error = %e, "class dump failed");
            }
        }
        class_data
    }

    /// Write `class_data` to `<root>/<class path>.class` if the filter accepts
    /// `class_name`. An existing file is truncated and rewritten.
    pub fn dump(&self, class_name: &str, class_data: &[u8]) -> Result<DumpOutcome, DumpError> {
        if !self.filter.accepts(class_name) {
            return Ok(DumpOutcome::Filtered);
        }

        let path = class_file_path(&self.root, class_name)
            .ok_or_else(|| DumpError::InvalidClassName(class_name.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| DumpError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        write_file(&path, class_data)?;
        Ok(DumpOutcome::Written(path))
    }
}

// Close errors are not observable through `File`'s drop and are ignored.
fn write_file(path: &Path, data: &[u8]) -> Result<(), DumpError> {
    let mut file = File::create(path).map_err(|source| DumpError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(data).map_err(|source| DumpError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Map a class name to its dump location under `root`.
///
/// Both `/` and `.` separate packages, so `com/example/Foo` and
/// `com.example.Foo` land on the same file. Empty segments are dropped, which
/// keeps the result under `root` for names like `/abs/Foo` or `..Foo`.
/// Returns `None` if nothing is left.
pub fn class_file_path(root: &Path, class_name: &str) -> Option<PathBuf> {
    let mut segments = class_name
        .split(['/', '.'])
        .filter(|s| !s.is_empty())
        .peekable();
    segments.peek()?;

    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment);
    }
    let mut file_name = path.file_name()?.to_os_string();
    file_name.push(CLASS_SUFFIX);
    path.set_file_name(file_name);
    Some(path)
}
