//! Render blocks: one program plus declared input/output ports.

use std::collections::HashMap;
use std::fmt;

use prism_core::{ProgramKey, RenderError, UniformValue};
use prism_graph::{InputKind, InputPort, OutputPort};

use crate::backend::{LinkedProgram, PassOp, PassTarget, RenderBackend};
use crate::program::build_program;
use crate::FrameCtx;

/// Built-in uniforms staged automatically when the program declares them.
/// Explicitly staged values win over both.
const TIME_UNIFORM: &str = "time";
const RESOLUTION_UNIFORM: &str = "resolution";

/// The unit of composition: one program, declared ports, staged uniforms.
///
/// A block is immutable after construction except for the uniform values
/// staged into it (write-then-read, most recent value before execution wins)
/// and program hot-swaps at frame boundaries. A block whose program has
/// never linked is "not ready" and sits out of frame execution until a
/// rebuild succeeds.
pub struct RenderBlock<B: RenderBackend> {
    label: String,
    /// Resource key this block's source is watched under, if hot-reloadable.
    key: Option<ProgramKey>,
    inputs: Vec<InputPort>,
    output: OutputPort,
    program: Option<LinkedProgram<B>>,
    staged: HashMap<String, UniformValue>,
}

impl<B: RenderBackend> fmt::Debug for RenderBlock<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBlock")
            .field("label", &self.label)
            .field("key", &self.key)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("ready", &self.program.is_some())
            .field("staged", &self.staged)
            .finish()
    }
}

impl<B: RenderBackend> RenderBlock<B> {
    /// A block with no program yet; not ready until a rebuild succeeds.
    pub fn new(label: impl Into<String>, inputs: Vec<InputPort>, output: OutputPort) -> Self {
        RenderBlock {
            label: label.into(),
            key: None,
            inputs,
            output,
            program: None,
            staged: HashMap::new(),
        }
    }

    /// Build a block and its program in one go.
    pub fn with_source(
        backend: &mut B,
        label: impl Into<String>,
        inputs: Vec<InputPort>,
        output: OutputPort,
        source: &str,
    ) -> Result<Self, RenderError> {
        let mut block = RenderBlock::new(label, inputs, output);
        block.rebuild_from_source(backend, source)?;
        Ok(block)
    }

    /// Watch a resource key: hot-reload events for it rebuild this block.
    pub fn watched(mut self, key: ProgramKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key(&self) -> Option<&ProgramKey> {
        self.key.as_ref()
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn output(&self) -> OutputPort {
        self.output
    }

    pub fn ready(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<&LinkedProgram<B>> {
        self.program.as_ref()
    }

    fn origin(&self) -> &str {
        self.key.as_ref().map(|k| k.as_str()).unwrap_or(&self.label)
    }

    /// Stage a uniform value for the next execution.
    ///
    /// Fails with `UnknownUniform` when the program directory has no such
    /// name, and with `UniformTypeMismatch` when the declared type differs.
    /// The latest value staged before execution wins; values persist across
    /// frames until overwritten.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), RenderError> {
        let program = self.program.as_ref().ok_or_else(|| RenderError::NotReady {
            block: self.label.clone(),
        })?;

        let info = program
            .uniforms
            .get(name)
            .ok_or_else(|| RenderError::UnknownUniform {
                name: name.to_string(),
            })?;

        if info.ty != value.glsl_type() {
            return Err(RenderError::UniformTypeMismatch {
                name: name.to_string(),
                declared: info.ty.clone(),
                provided: value.glsl_type().to_string(),
            });
        }

        self.staged.insert(name.to_string(), value);
        Ok(())
    }

    /// Rebuild the program from a fresh source blob.
    ///
    /// On success the old program is retired to the backend and stale staged
    /// values (names the new program no longer declares, or declares with a
    /// different type) are dropped. On failure the previous working program
    /// stays installed and keeps rendering.
    pub fn rebuild_from_source(&mut self, backend: &mut B, source: &str) -> Result<(), RenderError> {
        let origin = self.origin().to_string();
        let fresh = build_program(backend, source, &origin)?;

        if let Some(old) = self.program.take() {
            backend.destroy_program(old);
        }
        self.staged.retain(|name, value| {
            fresh
                .uniforms
                .get(name)
                .is_some_and(|info| info.ty == value.glsl_type())
        });
        self.program = Some(fresh);
        Ok(())
    }

    /// Release every backend resource this block owns.
    pub fn teardown(mut self, backend: &mut B) {
        if let Some(program) = self.program.take() {
            backend.destroy_program(program);
        }
    }

    /// Execute one pass: validate bound inputs against the declared ports,
    /// resolve uniforms and issue the draw.
    ///
    /// `bound_inputs` must carry exactly the declared texture ports, in
    /// order; anything else is a `PortMismatch`. A `UniformValue` port with
    /// neither a staged value nor a default is an `UnboundInput` for this
    /// frame.
    pub fn execute(
        &mut self,
        backend: &mut B,
        bound_inputs: &[(&str, &B::Target)],
        ctx: FrameCtx,
        output: PassTarget<'_, B>,
    ) -> Result<(), RenderError> {
        let program = self.program.as_ref().ok_or_else(|| RenderError::NotReady {
            block: self.label.clone(),
        })?;

        let texture_ports: Vec<&InputPort> = self
            .inputs
            .iter()
            .filter(|p| p.kind == InputKind::Texture)
            .collect();

        if texture_ports.len() != bound_inputs.len() {
            return Err(RenderError::PortMismatch {
                block: self.label.clone(),
                detail: format!(
                    "{} texture ports declared, {} inputs bound",
                    texture_ports.len(),
                    bound_inputs.len()
                ),
            });
        }
        for (port, (name, _)) in texture_ports.iter().zip(bound_inputs) {
            if port.name != *name {
                return Err(RenderError::PortMismatch {
                    block: self.label.clone(),
                    detail: format!("expected port '{}', got '{}'", port.name, name),
                });
            }
        }

        let mut uniforms: Vec<(String, B::UniformLocation, UniformValue)> = Vec::new();
        let mut push = |name: &str, value: UniformValue| {
            if let Some(info) = program.uniforms.get(name) {
                uniforms.push((name.to_string(), info.location.clone(), value));
            }
        };

        // Built-ins first, staged values after, so an explicit stage wins.
        if !self.staged.contains_key(TIME_UNIFORM) {
            push(TIME_UNIFORM, UniformValue::Float(ctx.time));
        }
        if !self.staged.contains_key(RESOLUTION_UNIFORM) {
            push(
                RESOLUTION_UNIFORM,
                UniformValue::Vec2([ctx.width as f32, ctx.height as f32]),
            );
        }
        for (name, value) in &self.staged {
            push(name, *value);
        }

        // Uniform-value ports are the required parameters: staged or default,
        // or the block sits this frame out.
        for port in self.inputs.iter().filter(|p| p.kind == InputKind::UniformValue) {
            if self.staged.contains_key(&port.name) {
                continue;
            }
            match port.default {
                Some(default) => push(&port.name, default),
                None => {
                    return Err(RenderError::UnboundInput {
                        block: self.label.clone(),
                        port: port.name.clone(),
                    })
                }
            }
        }

        let inputs = bound_inputs
            .iter()
            .map(|(name, target)| (name.to_string(), *target))
            .collect();

        backend.run_pass(PassOp {
            program,
            uniforms,
            inputs,
            output,
            viewport: (ctx.width, ctx.height),
        })
    }
}
