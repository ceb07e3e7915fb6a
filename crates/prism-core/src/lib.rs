#![forbid(unsafe_code)]

//! prism shared vocabulary.
//!
//! This crate is **contract-only**: no GL handles, no windowing, no OS policy.
//! It holds the types every other prism crate speaks: the error taxonomy,
//! engine configuration, program keys, uniform values and the process-wide
//! render mode.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod mode;
pub mod values;

pub use config::{load_engine_config_from, EngineConfig};
pub use error::RenderError;
pub use key::ProgramKey;
pub use mode::{Mode, ModeCell};
pub use values::UniformValue;
