//! Compile-only compatibility crate.
//!
//! This crate exists to ensure the public SDK surface remains usable by third-party
//! consumers. It is not shipped or run; it must only build.

use prism_core::{EngineConfig, Mode, ModeCell, ProgramKey, UniformValue};
use prism_graph::{Graph, InputPort, OutputPort, TargetFormat};
use prism_shader::{split_stages, StageKind};

#[allow(dead_code)]
pub fn _compile_witness() {
    // Stage vocabulary and splitting stay addressable by name.
    let _ = StageKind::Vertex.marker();
    let _ = split_stages("#vs\nvoid main() {}\n#fs\nvoid main() {}\n");

    // A graph builds with typed ports using only public APIs.
    let mut g = Graph::new();
    let src = g.add_block("src", Vec::new(), OutputPort::color(TargetFormat::Rgba8));
    let out = g.add_block(
        "out",
        vec![InputPort::texture("source")],
        OutputPort::default_target(),
    );
    let _ = g.connect(src, out, "source");
    let _ = g.schedule();

    // Mode plumbing must remain constructible without a backend.
    let cell = ModeCell::new(Mode::Empty);
    let _ = cell.replace(Mode::ShaderToy(ProgramKey::new("shaders.test")));
    let _ = cell.snapshot();

    // Control messages and config models keep their shapes.
    let _ = prism_control::parse_msg("\"empty_mode\"");
    let _ = EngineConfig::default();
    let _ = UniformValue::Vec4([0.0; 4]).glsl_type();
}
