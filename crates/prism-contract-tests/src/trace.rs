//! A recording backend.
//!
//! Compiles by scanning the stage text (the same scanner link-time checks
//! use), links by merging the scanned directories, and "draws" by appending
//! to a command log. Sources containing the token `FAIL_COMPILE` are
//! rejected, standing in for backend compiler errors; `FAIL_LINK` likewise
//! for link errors.

use std::collections::BTreeMap;

use prism_core::{RenderError, UniformValue};
use prism_graph::TargetFormat;
use prism_runtime::{
    AttributeInfo, CompiledStage, LinkedProgram, PassOp, PassTarget, RenderBackend, UniformInfo,
};
use prism_shader::{scan_interface, StageInterface, StageKind, StageSource};

#[derive(Debug)]
pub struct TraceStage {
    pub kind: StageKind,
    pub interface: StageInterface,
    pub fail_link: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceTarget {
    pub id: u32,
    pub w: i32,
    pub h: i32,
    pub format: TargetFormat,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceOutput {
    Offscreen(u32),
    Default,
}

/// One recorded backend operation.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceOp {
    Linked {
        program: u32,
        origin: String,
    },
    DestroyedProgram(u32),
    Clear {
        color: [f32; 4],
    },
    Pass {
        program: u32,
        uniforms: Vec<(String, UniformValue)>,
        inputs: Vec<(String, u32)>,
        output: TraceOutput,
    },
}

#[derive(Debug, Default)]
pub struct TraceBackend {
    next_id: u32,
    pub log: Vec<TraceOp>,
    pub live_stages: usize,
    pub live_programs: usize,
    pub live_targets: usize,
}

impl TraceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Every recorded pass, in submission order.
    pub fn passes(&self) -> Vec<&TraceOp> {
        self.log
            .iter()
            .filter(|op| matches!(op, TraceOp::Pass { .. }))
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl RenderBackend for TraceBackend {
    type StageHandle = TraceStage;
    type ProgramHandle = u32;
    type Target = TraceTarget;
    type UniformLocation = u32;

    fn compile_stage(
        &mut self,
        stage: &StageSource,
        origin: &str,
    ) -> Result<CompiledStage<TraceStage>, RenderError> {
        if stage.text.contains("FAIL_COMPILE") {
            return Err(RenderError::Compile {
                stage: stage.kind.name(),
                origin: origin.to_string(),
                log: "forced compile failure".to_string(),
            });
        }

        self.live_stages += 1;
        Ok(CompiledStage {
            kind: stage.kind,
            handle: TraceStage {
                kind: stage.kind,
                interface: scan_interface(&stage.text),
                fail_link: stage.text.contains("FAIL_LINK"),
            },
            diagnostics: Vec::new(),
        })
    }

    fn destroy_stage(&mut self, _stage: CompiledStage<TraceStage>) {
        self.live_stages -= 1;
    }

    fn link_program(
        &mut self,
        stages: Vec<CompiledStage<TraceStage>>,
        origin: &str,
    ) -> Result<LinkedProgram<Self>, RenderError> {
        self.live_stages -= stages.len();

        if stages.iter().any(|s| s.handle.fail_link) {
            return Err(RenderError::Link {
                origin: origin.to_string(),
                log: "forced link failure".to_string(),
            });
        }

        let mut uniforms = BTreeMap::new();
        let mut next_location = 0u32;
        for s in &stages {
            for decl in &s.handle.interface.uniforms {
                uniforms.entry(decl.name.clone()).or_insert_with(|| {
                    let info = UniformInfo {
                        ty: decl.ty.clone(),
                        location: next_location,
                    };
                    next_location += 1;
                    info
                });
            }
        }

        let mut attributes = BTreeMap::new();
        if let Some(vertex) = stages.iter().find(|s| s.kind == StageKind::Vertex) {
            for (i, decl) in vertex.handle.interface.inputs.iter().enumerate() {
                attributes.insert(
                    decl.name.clone(),
                    AttributeInfo {
                        ty: decl.ty.clone(),
                        location: i as u32,
                    },
                );
            }
        }

        let program = self.fresh_id();
        self.live_programs += 1;
        self.log.push(TraceOp::Linked {
            program,
            origin: origin.to_string(),
        });

        Ok(LinkedProgram {
            handle: program,
            uniforms,
            attributes,
            diagnostics: Vec::new(),
        })
    }

    fn destroy_program(&mut self, program: LinkedProgram<Self>) {
        self.live_programs -= 1;
        self.log.push(TraceOp::DestroyedProgram(program.handle));
    }

    fn create_target(
        &mut self,
        width: i32,
        height: i32,
        format: TargetFormat,
    ) -> Result<TraceTarget, RenderError> {
        let id = self.fresh_id();
        self.live_targets += 1;
        Ok(TraceTarget {
            id,
            w: width,
            h: height,
            format,
        })
    }

    fn resize_target(
        &mut self,
        target: &mut TraceTarget,
        width: i32,
        height: i32,
    ) -> Result<(), RenderError> {
        target.w = width;
        target.h = height;
        Ok(())
    }

    fn destroy_target(&mut self, _target: TraceTarget) {
        self.live_targets -= 1;
    }

    fn target_size(&self, target: &TraceTarget) -> (i32, i32) {
        (target.w, target.h)
    }

    fn clear_default_target(&mut self, _width: i32, _height: i32, color: [f32; 4]) {
        self.log.push(TraceOp::Clear { color });
    }

    fn run_pass(&mut self, pass: PassOp<'_, Self>) -> Result<(), RenderError> {
        let output = match pass.output {
            PassTarget::Offscreen(t) => TraceOutput::Offscreen(t.id),
            PassTarget::Default => TraceOutput::Default,
        };
        self.log.push(TraceOp::Pass {
            program: pass.program.handle,
            uniforms: pass
                .uniforms
                .iter()
                .map(|(name, _loc, value)| (name.clone(), *value))
                .collect(),
            inputs: pass
                .inputs
                .iter()
                .map(|(name, target)| (name.clone(), target.id))
                .collect(),
            output,
        });
        Ok(())
    }
}
