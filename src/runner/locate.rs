use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, GstError};

pub const DEFAULT_EXECUTABLE: &str = "gst";

/// Finds the translator executable.
///
/// Order: an explicitly configured path, then every directory on `PATH`,
/// then a few names relative to the working directory.
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    name: String,
    explicit: Option<PathBuf>,
    search_path: Option<OsString>,
    working_dir: PathBuf,
}

impl Default for ExecutableLocator {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

impl ExecutableLocator {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            explicit: None,
            search_path: std::env::var_os("PATH"),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_explicit<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.explicit = path.map(Into::into);
        self
    }

    /// Replace the `PATH` value that is searched.
    pub fn with_search_path<S: Into<OsString>>(mut self, search_path: Option<S>) -> Self {
        self.search_path = search_path.map(Into::into);
        self
    }

    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(explicit) = &self.explicit {
            if explicit.is_file() {
                return Ok(explicit.clone());
            }
            debug!("Configured translator path {} does not exist", explicit.display());
        }

        match which::which_in(&self.name, self.search_path.as_ref(), &self.working_dir) {
            Ok(found) => return Ok(found),
            Err(e) => debug!("'{}' not found on PATH: {}", self.name, e),
        }

        for candidate in self.local_candidates() {
            let path = self.working_dir.join(&candidate);
            if path.is_file() {
                return Ok(std::fs::canonicalize(&path).unwrap_or(path));
            }
        }

        Err(GstError::ExecutableNotFound(format!(
            "'{}' is not installed or not available in PATH",
            self.name
        )))
    }

    fn local_candidates(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{}.exe", self.name),
            format!("./{}", self.name),
            format!("./{}.exe", self.name),
        ]
    }
}
