use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logical key naming a shader program resource.
///
/// Keys use a module-path notation, `"shaders.test"`, the exact same spelling
/// the control panel sends. The on-disk location is derived by mapping dots to
/// path separators under the resource root, `shaders/test.glsl`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize)]
pub struct ProgramKey(String);

impl ProgramKey {
    pub fn new(path: &str) -> Self {
        ProgramKey(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative file path for this key under a resource root.
    pub fn to_rel_path(&self) -> PathBuf {
        PathBuf::from(self.0.replace('.', "/") + ".glsl")
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
