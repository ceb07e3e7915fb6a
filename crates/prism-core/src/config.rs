//! Engine configuration loaded from JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

fn default_mode_addr() -> String {
    "127.0.0.1:6666".to_string()
}

fn default_param_addr() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_shader_root() -> PathBuf {
    PathBuf::from("data")
}

/// Host-facing engine configuration.
///
/// The frame-rate limit is carried here for the host scheduler; the engine
/// itself accepts being driven at any rate.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,

    /// Upper bound on frames per second enforced by the host, if any.
    #[serde(default)]
    pub fps_limit: Option<u32>,

    /// TCP address the mode control channel listens on.
    #[serde(default = "default_mode_addr")]
    pub mode_addr: String,

    /// UDP address the OSC parameter channel listens on.
    #[serde(default = "default_param_addr")]
    pub param_addr: String,

    /// Root directory shader program sources are resolved under.
    #[serde(default = "default_shader_root")]
    pub shader_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            width: 960,
            height: 540,
            fps_limit: None,
            mode_addr: default_mode_addr(),
            param_addr: default_param_addr(),
            shader_root: default_shader_root(),
        }
    }
}

/// Load an [`EngineConfig`] from a JSON file.
pub fn load_engine_config_from(path: impl AsRef<Path>) -> Result<EngineConfig, RenderError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let cfg: EngineConfig = serde_json::from_slice(&bytes).map_err(|source| RenderError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if cfg.width == 0 || cfg.height == 0 {
        return Err(RenderError::InvalidConfig {
            path: path.to_path_buf(),
            msg: format!("degenerate resolution {}x{}", cfg.width, cfg.height),
        });
    }

    Ok(cfg)
}
