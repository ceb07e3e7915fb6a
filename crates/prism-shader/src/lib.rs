#![forbid(unsafe_code)]

//! Multi-stage shader source handling.
//!
//! A program source is one text blob holding every stage, each introduced by
//! a pragma line:
//!
//! - `#vs`: *vertex stage*
//! - `#gs`: *geometry stage*
//! - `#fs`: *fragment stage*
//!
//! A stage starts at such a pragma and ends at the next pragma or end of
//! file. You cannot use the same pragma twice in a file. At the top of the
//! file, before any pragma, only blank lines and `//` comments are allowed.
//!
//! This crate is text-only: splitting and the interface scanner know nothing
//! about GL. Backend compilation lives in the runtime crates.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod interface;
pub mod split;
pub mod stage;

pub use interface::{check_varyings, merge_uniforms, scan_interface, StageInterface, VarDecl};
pub use split::split_stages;
pub use stage::{StageKind, StageSource};
