//! The backend seam.
//!
//! A backend owns the GPU objects and knows how to compile, link and draw.
//! Everything it hands back travels inside the carrier types below, so the
//! rest of the runtime never touches a raw handle.

use std::collections::BTreeMap;
use std::fmt;

use prism_core::{RenderError, UniformValue};
use prism_graph::TargetFormat;
use prism_shader::{StageKind, StageSource};

/// One compiled stage. The handle owns the backend resource until the stage
/// is consumed by a link or explicitly destroyed.
#[derive(Debug)]
pub struct CompiledStage<H> {
    pub kind: StageKind,
    pub handle: H,
    /// Compiler messages, captured on success (warnings) as well as failure.
    pub diagnostics: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniformInfo<L> {
    /// GLSL spelling of the type, e.g. `vec4`, `sampler2D`.
    pub ty: String,
    pub location: L,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeInfo {
    pub ty: String,
    pub location: u32,
}

/// A linked, executable program with its resolved symbol directories.
///
/// Owned by exactly one [`crate::RenderBlock`]; destroyed through the
/// backend when that block is torn down or the program is hot-swapped out.
pub struct LinkedProgram<B: RenderBackend + ?Sized> {
    pub handle: B::ProgramHandle,
    pub uniforms: BTreeMap<String, UniformInfo<B::UniformLocation>>,
    pub attributes: BTreeMap<String, AttributeInfo>,
    /// Stage warnings carried over from compilation.
    pub diagnostics: Vec<String>,
}

impl<B: RenderBackend + ?Sized> fmt::Debug for LinkedProgram<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("handle", &self.handle)
            .field("uniforms", &self.uniforms)
            .field("attributes", &self.attributes)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Where a pass draws.
pub enum PassTarget<'a, B: RenderBackend + ?Sized> {
    Offscreen(&'a B::Target),
    Default,
}

impl<B: RenderBackend + ?Sized> fmt::Debug for PassTarget<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassTarget::Offscreen(t) => f.debug_tuple("Offscreen").field(t).finish(),
            PassTarget::Default => f.write_str("Default"),
        }
    }
}

/// One fullscreen pass, fully resolved: program, uniform values with their
/// directory locations, input textures in declared port order (texture unit
/// index = position), and the output target.
pub struct PassOp<'a, B: RenderBackend + ?Sized> {
    pub program: &'a LinkedProgram<B>,
    pub uniforms: Vec<(String, B::UniformLocation, UniformValue)>,
    pub inputs: Vec<(String, &'a B::Target)>,
    pub output: PassTarget<'a, B>,
    pub viewport: (i32, i32),
}

impl<B: RenderBackend + ?Sized> fmt::Debug for PassOp<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassOp")
            .field("uniforms", &self.uniforms)
            .field("inputs", &self.inputs.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("output", &self.output)
            .field("viewport", &self.viewport)
            .finish()
    }
}

/// GPU backend contract.
///
/// A backend is owned by the single rendering thread together with the
/// driver; nothing here is `Send`. Draw submission is blocking from the
/// caller's point of view; actual completion is the backend's business, the
/// contract only requires that output availability is ordered before any
/// dependent read (command ordering, not polling).
pub trait RenderBackend {
    type StageHandle: fmt::Debug;
    type ProgramHandle: fmt::Debug;
    type Target: fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    /// Compile one stage. On failure the error carries the stage kind, the
    /// blob origin and the backend's diagnostic log.
    fn compile_stage(
        &mut self,
        stage: &StageSource,
        origin: &str,
    ) -> Result<CompiledStage<Self::StageHandle>, RenderError>;

    /// Release a compiled stage that will not be linked.
    fn destroy_stage(&mut self, stage: CompiledStage<Self::StageHandle>);

    /// Link compiled stages into one program and resolve its uniform and
    /// attribute directories from the backend's active-resource queries.
    /// Consumes the stages in success and failure alike.
    fn link_program(
        &mut self,
        stages: Vec<CompiledStage<Self::StageHandle>>,
        origin: &str,
    ) -> Result<LinkedProgram<Self>, RenderError>;

    fn destroy_program(&mut self, program: LinkedProgram<Self>);

    fn create_target(
        &mut self,
        width: i32,
        height: i32,
        format: TargetFormat,
    ) -> Result<Self::Target, RenderError>;

    fn resize_target(
        &mut self,
        target: &mut Self::Target,
        width: i32,
        height: i32,
    ) -> Result<(), RenderError>;

    fn destroy_target(&mut self, target: Self::Target);

    fn target_size(&self, target: &Self::Target) -> (i32, i32);

    /// Clear the default framebuffer; the whole frame in `Empty` mode.
    fn clear_default_target(&mut self, width: i32, height: i32, color: [f32; 4]);

    fn run_pass(&mut self, pass: PassOp<'_, Self>) -> Result<(), RenderError>;
}
