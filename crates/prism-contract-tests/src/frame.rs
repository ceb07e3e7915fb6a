//! Frame-driver contracts: mode dispatch, routing, readiness, hot swap.

use prism_core::{Mode, ProgramKey, RenderError, UniformValue};
use prism_graph::{BlockId, InputPort, OutputPort, TargetFormat};
use prism_runtime::{Compositor, FrameCtx, FrameGraph, RenderBlock, SkipReason, SourceEvent};

use crate::trace::{TraceBackend, TraceOp, TraceOutput};

const RED_TOY: &str = "\
#vs
in vec2 position;
void main() {
  gl_Position = vec4(position, 0., 1.);
}
#fs
uniform vec4 color;
out vec4 frag;
void main() {
  frag = color;
}
";

const SOURCE_TOY: &str = "\
#vs
in vec2 position;
void main() {
  gl_Position = vec4(position, 0., 1.);
}
#fs
uniform float time;
out vec4 frag;
void main() {
  frag = vec4(abs(sin(time)), 0., 0., 1.);
}
";

const BLIT_TOY: &str = "\
#vs
in vec2 position;
out vec2 uv;
void main() {
  uv = position * .5 + .5;
  gl_Position = vec4(position, 0., 1.);
}
#fs
in vec2 uv;
uniform sampler2D source;
out vec4 frag;
void main() {
  frag = texture(source, uv);
}
";

fn ctx() -> FrameCtx {
    FrameCtx {
        width: 640,
        height: 360,
        time: 0.25,
        frame: 1,
    }
}

fn toy_key() -> ProgramKey {
    ProgramKey::new("shaders.test")
}

/// One fullscreen block straight to the default target.
fn single_block_compositor() -> (Compositor<TraceBackend>, BlockId) {
    let mut comp = Compositor::new(TraceBackend::new());
    let block = RenderBlock::with_source(
        comp.backend_mut(),
        "toy",
        vec![],
        OutputPort::default_target(),
        RED_TOY,
    )
    .expect("red toy builds");

    let mut graph = FrameGraph::new();
    let id = graph.add_block(block);
    comp.register(toy_key(), graph);
    (comp, id)
}

/// generator -> blit chain ending at the default target.
fn chain_compositor() -> (Compositor<TraceBackend>, BlockId, BlockId) {
    let mut comp = Compositor::new(TraceBackend::new());

    let generator = RenderBlock::with_source(
        comp.backend_mut(),
        "generator",
        vec![],
        OutputPort::color(TargetFormat::Rgba8),
        SOURCE_TOY,
    )
    .expect("generator builds");
    let blit = RenderBlock::with_source(
        comp.backend_mut(),
        "blit",
        vec![InputPort::texture("source")],
        OutputPort::default_target(),
        BLIT_TOY,
    )
    .expect("blit builds");

    let mut graph = FrameGraph::new();
    let gen_id = graph.add_block(generator);
    let blit_id = graph.add_block(blit);
    graph.connect(gen_id, blit_id, "source").expect("gen -> blit");

    comp.register(toy_key(), graph);
    (comp, gen_id, blit_id)
}

#[test]
fn uniform_color_reaches_the_default_target() {
    let (mut comp, id) = single_block_compositor();
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");
    comp.graph_mut(&toy_key())
        .expect("registered graph")
        .set_uniform(id, "color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        .expect("color is in the directory");

    let report = comp.run_frame(ctx()).expect("frame runs");
    assert!(report.did_render(id));
    assert!(!report.cleared_only);

    let backend = comp.backend_mut();
    match backend.log.last() {
        Some(TraceOp::Pass {
            uniforms, output, ..
        }) => {
            assert_eq!(*output, TraceOutput::Default);
            assert!(uniforms
                .contains(&("color".to_string(), UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))));
        }
        other => panic!("expected a terminal pass, got {other:?}"),
    }
}

#[test]
fn staged_values_are_write_then_read() {
    let (mut comp, id) = single_block_compositor();
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    let graph = comp.graph_mut(&toy_key()).expect("registered graph");
    graph
        .set_uniform(id, "color", UniformValue::Vec4([0.0, 1.0, 0.0, 1.0]))
        .expect("first write");
    graph
        .set_uniform(id, "color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        .expect("second write wins");

    comp.run_frame(ctx()).expect("frame runs");
    match comp.backend_mut().log.last() {
        Some(TraceOp::Pass { uniforms, .. }) => {
            let colors: Vec<_> = uniforms.iter().filter(|(n, _)| n == "color").collect();
            assert_eq!(colors.len(), 1, "no queue of historical values");
            assert_eq!(colors[0].1, UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        }
        other => panic!("expected a pass, got {other:?}"),
    }
}

#[test]
fn unknown_uniform_is_rejected() {
    let (mut comp, id) = single_block_compositor();
    let graph = comp.graph_mut(&toy_key()).expect("registered graph");
    assert!(matches!(
        graph.set_uniform(id, "no_such_uniform", UniformValue::Float(1.0)),
        Err(RenderError::UnknownUniform { .. })
    ));
    assert!(matches!(
        graph.set_uniform(id, "color", UniformValue::Float(1.0)),
        Err(RenderError::UniformTypeMismatch { .. })
    ));
}

#[test]
fn chain_routes_generator_output_into_blit_input() {
    let (mut comp, gen_id, blit_id) = chain_compositor();
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    let report = comp.run_frame(ctx()).expect("frame runs");
    assert_eq!(report.rendered, vec![gen_id, blit_id]);

    let backend = comp.backend_mut();
    let passes = backend.passes();
    assert_eq!(passes.len(), 2);

    let gen_target = match passes[0] {
        TraceOp::Pass {
            output: TraceOutput::Offscreen(t),
            uniforms,
            ..
        } => {
            // The generator declares `time`; the driver feeds it.
            assert!(uniforms.contains(&("time".to_string(), UniformValue::Float(0.25))));
            *t
        }
        other => panic!("generator pass expected, got {other:?}"),
    };
    match passes[1] {
        TraceOp::Pass { inputs, output, .. } => {
            assert_eq!(inputs, &vec![("source".to_string(), gen_target)]);
            assert_eq!(*output, TraceOutput::Default);
        }
        other => panic!("blit pass expected, got {other:?}"),
    }
}

#[test]
fn frames_over_an_unmodified_graph_execute_in_the_same_order() {
    let (mut comp, _, _) = chain_compositor();
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    let first = comp.run_frame(ctx()).expect("first frame");
    let second = comp.run_frame(ctx()).expect("second frame");
    assert_eq!(first.rendered, second.rendered);
}

#[test]
fn empty_mode_clears_and_never_touches_subgraph_blocks() {
    let (mut comp, _id) = single_block_compositor();

    // Startup mode is Empty.
    assert_eq!(comp.mode_cell().snapshot(), Mode::Empty);
    let report = comp.run_frame(ctx()).expect("empty frame");
    assert!(report.cleared_only);
    assert!(report.rendered.is_empty());
    assert!(comp.backend_mut().passes().is_empty());
    assert!(matches!(
        comp.backend_mut().log.last(),
        Some(TraceOp::Clear { .. })
    ));

    // Empty -> ShaderToy -> Empty, per the control panel.
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");
    assert_eq!(comp.mode_cell().snapshot(), Mode::ShaderToy(toy_key()));
    comp.run_frame(ctx()).expect("toy frame");
    assert_eq!(comp.backend_mut().passes().len(), 1);

    comp.request_mode(Mode::Empty).expect("back to empty");
    comp.backend_mut().clear_log();
    comp.run_frame(ctx()).expect("empty again");
    assert!(
        comp.backend_mut().passes().is_empty(),
        "no subgraph block may execute while mode is Empty"
    );
}

#[test]
fn control_messages_drive_mode_transitions() {
    let (mut comp, _id) = single_block_compositor();

    let msg = prism_control::parse_msg("{\"shader_toy\": \"shaders.test\"}").expect("wire parse");
    comp.request_mode(msg.to_mode().expect("mode message"))
        .expect("apply");
    assert_eq!(comp.mode_cell().snapshot(), Mode::ShaderToy(toy_key()));

    let msg = prism_control::parse_msg("\"empty_mode\"").expect("wire parse");
    comp.request_mode(msg.to_mode().expect("mode message"))
        .expect("apply");
    assert_eq!(comp.mode_cell().snapshot(), Mode::Empty);
}

#[test]
fn unknown_mode_key_is_dropped_and_mode_unchanged() {
    let (mut comp, _id) = single_block_compositor();

    match comp.request_mode(Mode::ShaderToy(ProgramKey::new("shaders.missing"))) {
        Err(RenderError::NotFound { key }) => assert_eq!(key, "shaders.missing"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(comp.mode_cell().snapshot(), Mode::Empty);
}

#[test]
fn broken_hot_swap_keeps_last_good_program_and_topology() {
    let mut comp = Compositor::new(TraceBackend::new());

    let generator = RenderBlock::with_source(
        comp.backend_mut(),
        "generator",
        vec![],
        OutputPort::color(TargetFormat::Rgba8),
        SOURCE_TOY,
    )
    .expect("generator builds")
    .watched(ProgramKey::new("shaders.generator"));
    let blit = RenderBlock::with_source(
        comp.backend_mut(),
        "blit",
        vec![InputPort::texture("source")],
        OutputPort::default_target(),
        BLIT_TOY,
    )
    .expect("blit builds");

    let mut graph = FrameGraph::new();
    let gen_id = graph.add_block(generator);
    let blit_id = graph.add_block(blit);
    graph.connect(gen_id, blit_id, "source").expect("gen -> blit");
    comp.register(toy_key(), graph);
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    comp.run_frame(ctx()).expect("first frame");
    let good_program = match comp.backend_mut().passes()[0] {
        TraceOp::Pass { program, .. } => *program,
        other => panic!("generator pass expected, got {other:?}"),
    };
    let edges_before = comp.graph(&toy_key()).expect("graph").graph().edges().to_vec();

    // A deliberately broken replacement arrives from the resource watcher.
    comp.reload_sender()
        .send(SourceEvent {
            key: ProgramKey::new("shaders.generator"),
            text: SOURCE_TOY.replace("abs(sin(time))", "FAIL_COMPILE"),
        })
        .expect("queue reload");

    comp.backend_mut().clear_log();
    let report = comp.run_frame(ctx()).expect("degraded frame still runs");

    assert_eq!(report.reload_failures.len(), 1);
    assert_eq!(report.reload_failures[0].0, ProgramKey::new("shaders.generator"));
    assert!(report.did_render(gen_id), "last-good program keeps rendering");
    assert!(report.did_render(blit_id));
    match comp.backend_mut().passes()[0] {
        TraceOp::Pass { program, .. } => assert_eq!(*program, good_program),
        other => panic!("generator pass expected, got {other:?}"),
    }
    let edges_after = comp.graph(&toy_key()).expect("graph").graph().edges().to_vec();
    assert_eq!(edges_after, edges_before, "topology is untouched");

    // A fixed replacement swaps in and retires the old program.
    comp.reload_sender()
        .send(SourceEvent {
            key: ProgramKey::new("shaders.generator"),
            text: SOURCE_TOY.replace("0., 0., 1.", "0., 1., 1.").to_string(),
        })
        .expect("queue reload");

    comp.backend_mut().clear_log();
    comp.run_frame(ctx()).expect("swapped frame");

    let backend = comp.backend_mut();
    assert!(backend
        .log
        .iter()
        .any(|op| matches!(op, TraceOp::DestroyedProgram(p) if *p == good_program)));
    match backend.passes()[0] {
        TraceOp::Pass { program, .. } => assert_ne!(*program, good_program),
        other => panic!("generator pass expected, got {other:?}"),
    }
}

#[test]
fn not_ready_blocks_sit_frames_out_and_recover() {
    let mut comp = Compositor::new(TraceBackend::new());

    // The generator's program is still being built somewhere else.
    let generator = RenderBlock::new("generator", vec![], OutputPort::color(TargetFormat::Rgba8))
        .watched(ProgramKey::new("shaders.generator"));
    let blit = RenderBlock::with_source(
        comp.backend_mut(),
        "blit",
        vec![InputPort::texture("source")],
        OutputPort::default_target(),
        BLIT_TOY,
    )
    .expect("blit builds");

    let mut graph = FrameGraph::new();
    let gen_id = graph.add_block(generator);
    let blit_id = graph.add_block(blit);
    graph.connect(gen_id, blit_id, "source").expect("gen -> blit");
    comp.register(toy_key(), graph);
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    let report = comp.run_frame(ctx()).expect("degraded frame completes");
    assert!(report.rendered.is_empty());
    assert!(report
        .skipped
        .contains(&(gen_id, SkipReason::NotReady)));
    assert!(report
        .skipped
        .contains(&(blit_id, SkipReason::Upstream(gen_id))));

    // The build finishes and arrives through the reload queue.
    comp.reload_sender()
        .send(SourceEvent {
            key: ProgramKey::new("shaders.generator"),
            text: SOURCE_TOY.to_string(),
        })
        .expect("queue source");

    let report = comp.run_frame(ctx()).expect("recovered frame");
    assert_eq!(report.rendered, vec![gen_id, blit_id]);
}

#[test]
fn valueless_uniform_port_skips_until_staged() {
    let mut comp = Compositor::new(TraceBackend::new());
    let block = RenderBlock::with_source(
        comp.backend_mut(),
        "fade",
        vec![InputPort::value("color")],
        OutputPort::default_target(),
        RED_TOY,
    )
    .expect("toy builds");

    let mut graph = FrameGraph::new();
    let id = graph.add_block(block);
    comp.register(toy_key(), graph);
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    let report = comp.run_frame(ctx()).expect("frame completes degraded");
    assert!(report.skipped.contains(&(
        id,
        SkipReason::UnboundInput {
            port: "color".to_string()
        }
    )));

    comp.graph_mut(&toy_key())
        .expect("graph")
        .set_uniform(id, "color", UniformValue::Vec4([0.0, 0.0, 1.0, 1.0]))
        .expect("stage the required value");
    let report = comp.run_frame(ctx()).expect("bound frame");
    assert!(report.did_render(id));
}

#[test]
fn uniform_port_defaults_apply_when_nothing_is_staged() {
    let mut comp = Compositor::new(TraceBackend::new());
    let block = RenderBlock::with_source(
        comp.backend_mut(),
        "fade",
        vec![InputPort::value_with_default(
            "color",
            UniformValue::Vec4([0.0, 0.0, 0.0, 1.0]),
        )],
        OutputPort::default_target(),
        RED_TOY,
    )
    .expect("toy builds");

    let mut graph = FrameGraph::new();
    let id = graph.add_block(block);
    comp.register(toy_key(), graph);
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    let report = comp.run_frame(ctx()).expect("frame runs on the default");
    assert!(report.did_render(id));
    match comp.backend_mut().log.last() {
        Some(TraceOp::Pass { uniforms, .. }) => assert!(uniforms
            .contains(&("color".to_string(), UniformValue::Vec4([0.0, 0.0, 0.0, 1.0])))),
        other => panic!("expected a pass, got {other:?}"),
    }
}

#[test]
fn dead_blocks_are_reported_not_executed() {
    let (mut comp, _gen, _blit) = chain_compositor();
    let orphan = RenderBlock::with_source(
        comp.backend_mut(),
        "orphan",
        vec![],
        OutputPort::color(TargetFormat::Rgba8),
        SOURCE_TOY,
    )
    .expect("orphan builds");
    let orphan_id = comp
        .graph_mut(&toy_key())
        .expect("graph")
        .add_block(orphan);

    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");
    let report = comp.run_frame(ctx()).expect("frame runs");

    assert!(report.skipped.contains(&(orphan_id, SkipReason::Dead)));
    assert!(!report.did_render(orphan_id));
    assert_eq!(report.rendered.len(), 2);
}

#[test]
fn external_params_apply_at_the_frame_boundary() {
    let (mut comp, _gen, _blit) = chain_compositor();
    comp.request_mode(Mode::ShaderToy(toy_key())).expect("mode");

    // Two updates for the same uniform in one frame: last write wins.
    let params = comp.param_sender();
    params
        .send(prism_runtime::ParamEvent {
            name: "time".to_string(),
            value: 0.5,
        })
        .expect("first update");
    params
        .send(prism_runtime::ParamEvent {
            name: "time".to_string(),
            value: 0.75,
        })
        .expect("second update");

    comp.run_frame(ctx()).expect("frame runs");
    match comp.backend_mut().passes()[0] {
        TraceOp::Pass { uniforms, .. } => {
            let times: Vec<_> = uniforms.iter().filter(|(n, _)| n == "time").collect();
            assert_eq!(times.len(), 1);
            assert_eq!(times[0].1, UniformValue::Float(0.75));
        }
        other => panic!("generator pass expected, got {other:?}"),
    }
}
