#![forbid(unsafe_code)]

//! Backend-agnostic runtime.
//!
//! This crate defines the seam between graph semantics and GPU backends:
//! the [`RenderBackend`] trait, compiled-stage and linked-program carriers,
//! the [`RenderBlock`] composition unit and the frame driver. Backends
//! (`prism-runtime-glow`, the test backend in the contract tests) implement
//! the trait; everything above it is ordinary safe Rust.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod block;
pub mod driver;
pub mod program;

pub use backend::{
    AttributeInfo, CompiledStage, LinkedProgram, PassOp, PassTarget, RenderBackend, UniformInfo,
};
pub use block::RenderBlock;
pub use driver::{Compositor, FrameGraph, FrameReport, ParamEvent, SkipReason, SourceEvent};
pub use program::build_program;

/// Per-frame context supplied by the host (pull-based runtime).
#[derive(Clone, Copy, Debug)]
pub struct FrameCtx {
    pub width: i32,
    pub height: i32,
    pub time: f32,
    pub frame: u64,
}
