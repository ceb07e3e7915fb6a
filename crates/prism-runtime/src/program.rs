//! Program building: split, validate, compile, link.

use prism_core::RenderError;
use prism_shader::{
    check_varyings, merge_uniforms, scan_interface, split_stages, StageInterface, StageKind,
    StageSource,
};

use crate::backend::{LinkedProgram, RenderBackend};

/// Build a full program from one multi-stage source blob.
///
/// The pipeline is: split into stages, validate stage presence and order,
/// check the cross-stage interface textually (so diagnostics name symbols
/// and stages instead of echoing an opaque backend log), then compile and
/// link through the backend. Any failure releases every backend resource
/// acquired along the way.
pub fn build_program<B: RenderBackend>(
    backend: &mut B,
    source: &str,
    origin: &str,
) -> Result<LinkedProgram<B>, RenderError> {
    let stages = split_stages(source)?;
    validate_pipeline(&stages, origin)?;

    let interfaces: Vec<(StageKind, StageInterface)> = stages
        .iter()
        .map(|s| (s.kind, scan_interface(&s.text)))
        .collect();
    check_varyings(&interfaces, origin)?;
    merge_uniforms(&interfaces, origin)?;

    let mut compiled = Vec::with_capacity(stages.len());
    for stage in &stages {
        match backend.compile_stage(stage, origin) {
            Ok(c) => {
                for warning in &c.diagnostics {
                    log::warn!("{origin} {} stage: {warning}", stage.kind.name());
                }
                compiled.push(c);
            }
            Err(e) => {
                for c in compiled {
                    backend.destroy_stage(c);
                }
                return Err(e);
            }
        }
    }

    backend.link_program(compiled, origin)
}

/// A program needs a vertex and a fragment stage, declared in pipeline
/// order. The splitter already rejects duplicates.
fn validate_pipeline(stages: &[StageSource], origin: &str) -> Result<(), RenderError> {
    for pair in stages.windows(2) {
        if pair[1].kind <= pair[0].kind {
            return Err(RenderError::StageOrder {
                origin: origin.to_string(),
                found: pair[1].kind.name(),
                after: pair[0].kind.name(),
            });
        }
    }

    for required in [StageKind::Vertex, StageKind::Fragment] {
        if !stages.iter().any(|s| s.kind == required) {
            return Err(RenderError::MissingStage {
                origin: origin.to_string(),
                stage: required.name(),
            });
        }
    }

    Ok(())
}
