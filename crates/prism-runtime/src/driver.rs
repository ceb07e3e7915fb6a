//! The frame driver: graph execution, mode dispatch, boundary queues.
//!
//! One rendering thread owns a [`Compositor`] (and through it the backend
//! and every block). The only state shared with other threads is the mode
//! cell and the mpsc senders handed out for reload and parameter events;
//! both queues are drained at the top of `run_frame`, so nothing mutates a
//! block mid-frame.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use prism_core::{Mode, ModeCell, ProgramKey, RenderError, UniformValue};
use prism_graph::{BlockId, Graph, GraphError, InputKind, OutputKind, Schedule};

use crate::backend::{PassTarget, RenderBackend};
use crate::block::RenderBlock;
use crate::FrameCtx;

/// A changed shader source, pushed by the resource collaborator.
#[derive(Clone, Debug)]
pub struct SourceEvent {
    pub key: ProgramKey,
    pub text: String,
}

/// An externally controlled uniform value, pushed by the parameter channel.
#[derive(Clone, Debug)]
pub struct ParamEvent {
    pub name: String,
    pub value: f32,
}

/// Why a block sat a frame out.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// No successfully linked program yet; retried next frame.
    NotReady,
    /// A producing block did not render this frame.
    Upstream(BlockId),
    /// A required uniform port had neither a staged value nor a default.
    UnboundInput { port: String },
    /// Output feeds nothing; diagnosed by the schedule.
    Dead,
    /// The backend rejected the pass.
    PassFailed(String),
}

/// What one `run_frame` call actually did.
///
/// Per-frame readiness issues never raise; they surface here as "this block
/// did not render this frame".
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    pub rendered: Vec<BlockId>,
    pub skipped: Vec<(BlockId, SkipReason)>,
    pub reload_failures: Vec<(ProgramKey, String)>,
    /// True when the frame was only a clear of the default target.
    pub cleared_only: bool,
}

impl FrameReport {
    pub fn did_render(&self, id: BlockId) -> bool {
        self.rendered.contains(&id)
    }
}

/// One registered subgraph: block descriptors and edges on the contract
/// side, programs and render targets on the backend side, joined by id.
pub struct FrameGraph<B: RenderBackend> {
    graph: Graph,
    blocks: HashMap<BlockId, RenderBlock<B>>,
    targets: HashMap<BlockId, B::Target>,
    schedule: Option<Schedule>,
    degraded: HashSet<BlockId>,
}

impl<B: RenderBackend> fmt::Debug for FrameGraph<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameGraph")
            .field("graph", &self.graph)
            .field("blocks", &self.blocks.len())
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl<B: RenderBackend> Default for FrameGraph<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RenderBackend> FrameGraph<B> {
    pub fn new() -> Self {
        FrameGraph {
            graph: Graph::new(),
            blocks: HashMap::new(),
            targets: HashMap::new(),
            schedule: None,
            degraded: HashSet::new(),
        }
    }

    /// Insert a block; its declared ports become the graph descriptor.
    pub fn add_block(&mut self, block: RenderBlock<B>) -> BlockId {
        let id = self.graph.add_block(
            block.label().to_string(),
            block.inputs().to_vec(),
            block.output(),
        );
        self.blocks.insert(id, block);
        id
    }

    /// Connect `from`'s output into `to`'s named input port.
    pub fn connect(&mut self, from: BlockId, to: BlockId, port: &str) -> Result<(), GraphError> {
        self.graph.connect(from, to, port)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn block(&self, id: BlockId) -> Option<&RenderBlock<B>> {
        self.blocks.get(&id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut RenderBlock<B>> {
        self.blocks.get_mut(&id)
    }

    /// Stage a uniform value on one block.
    pub fn set_uniform(
        &mut self,
        id: BlockId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), RenderError> {
        let block = self
            .blocks
            .get_mut(&id)
            .ok_or_else(|| GraphError::UnknownBlock(id))?;
        block.set_uniform(name, value)
    }

    /// Blocks watching a hot-reload key.
    fn blocks_watching(&self, key: &ProgramKey) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self
            .blocks
            .iter()
            .filter(|(_, b)| b.key() == Some(key))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn apply_param(&mut self, name: &str, value: f32) {
        for block in self.blocks.values_mut() {
            match block.set_uniform(name, UniformValue::Float(value)) {
                Ok(()) => {}
                // Blocks that do not declare the parameter simply ignore it.
                Err(RenderError::UnknownUniform { .. }) | Err(RenderError::NotReady { .. }) => {}
                Err(e) => log::debug!("param '{name}' not applied to '{}': {e}", block.label()),
            }
        }
    }

    /// Release every backend resource owned by this subgraph.
    pub fn teardown(&mut self, backend: &mut B) {
        for (_, block) in self.blocks.drain() {
            block.teardown(backend);
        }
        for (_, target) in self.targets.drain() {
            backend.destroy_target(target);
        }
        self.schedule = None;
    }

    /// Execute one frame of this subgraph.
    fn run(
        &mut self,
        backend: &mut B,
        ctx: FrameCtx,
        report: &mut FrameReport,
    ) -> Result<(), RenderError> {
        let stale = self
            .schedule
            .as_ref()
            .map(|s| s.revision != self.graph.revision())
            .unwrap_or(true);
        if stale {
            let schedule = self.graph.schedule()?;
            if !schedule.dead.is_empty() {
                let labels: Vec<&str> = schedule
                    .dead
                    .iter()
                    .filter_map(|id| self.graph.block(*id).map(|b| b.label.as_str()))
                    .collect();
                log::warn!("graph has dead blocks (output feeds nothing): {labels:?}");
            }
            self.schedule = Some(schedule);
        }
        let schedule = self.schedule.clone().ok_or_else(|| {
            RenderError::other("schedule missing after refresh")
        })?;

        let dead: HashSet<BlockId> = schedule.dead.iter().copied().collect();
        let mut rendered_now: HashSet<BlockId> = HashSet::new();

        for &id in &schedule.order {
            if dead.contains(&id) {
                report.skipped.push((id, SkipReason::Dead));
                continue;
            }

            let Some(desc) = self.graph.block(id).cloned() else {
                continue;
            };
            let is_terminal = desc.output.kind == OutputKind::DefaultTarget;

            // All texture inputs must have rendered this frame already;
            // schedule order guarantees their pass was attempted first.
            let mut producers: Vec<(String, BlockId)> = Vec::new();
            let mut waiting_on: Option<BlockId> = None;
            for (i, port) in desc.inputs.iter().enumerate() {
                if port.kind != InputKind::Texture {
                    continue;
                }
                match self.graph.producer_of(id, i) {
                    Some(p) if rendered_now.contains(&p) => {
                        producers.push((port.name.clone(), p))
                    }
                    Some(p) => {
                        waiting_on = Some(p);
                        break;
                    }
                    // schedule() validated connectivity; stay defensive.
                    None => {
                        waiting_on = Some(id);
                        break;
                    }
                }
            }
            if let Some(p) = waiting_on {
                self.skip_recoverable(id, &desc.label, SkipReason::Upstream(p), report);
                continue;
            }

            let ready = self.blocks.get(&id).map(|b| b.ready()).unwrap_or(false);
            if !ready {
                self.skip_recoverable(id, &desc.label, SkipReason::NotReady, report);
                continue;
            }

            // Offscreen blocks render into an owned target sized to the frame.
            if !is_terminal {
                if let Some(target) = self.targets.get_mut(&id) {
                    if backend.target_size(target) != (ctx.width, ctx.height) {
                        if let Err(e) = backend.resize_target(target, ctx.width, ctx.height) {
                            log::error!("resizing target of '{}' failed: {e}", desc.label);
                            report.skipped.push((id, SkipReason::PassFailed(e.to_string())));
                            continue;
                        }
                    }
                } else {
                    match backend.create_target(ctx.width, ctx.height, desc.output.format) {
                        Ok(target) => {
                            self.targets.insert(id, target);
                        }
                        Err(e) => {
                            log::error!("allocating target of '{}' failed: {e}", desc.label);
                            report.skipped.push((id, SkipReason::PassFailed(e.to_string())));
                            continue;
                        }
                    }
                }
            }

            let mut bound: Vec<(&str, &B::Target)> = Vec::with_capacity(producers.len());
            let mut missing_target = false;
            for (name, producer) in &producers {
                match self.targets.get(producer) {
                    Some(t) => bound.push((name.as_str(), t)),
                    None => {
                        missing_target = true;
                        break;
                    }
                }
            }
            if missing_target {
                report.skipped.push((
                    id,
                    SkipReason::PassFailed("producer target missing".to_string()),
                ));
                continue;
            }

            let output = if is_terminal {
                PassTarget::Default
            } else {
                match self.targets.get(&id) {
                    Some(t) => PassTarget::Offscreen(t),
                    None => continue,
                }
            };

            let Some(block) = self.blocks.get_mut(&id) else {
                continue;
            };
            match block.execute(backend, &bound, ctx, output) {
                Ok(()) => {
                    rendered_now.insert(id);
                    report.rendered.push(id);
                    if self.degraded.remove(&id) {
                        log::info!("block '{}' is rendering again", desc.label);
                    }
                }
                Err(RenderError::NotReady { .. }) => {
                    self.skip_recoverable(id, &desc.label, SkipReason::NotReady, report);
                }
                Err(RenderError::UnboundInput { port, .. }) => {
                    self.skip_recoverable(id, &desc.label, SkipReason::UnboundInput { port }, report);
                }
                Err(e) => {
                    log::error!("pass of block '{}' failed: {e}", desc.label);
                    report.skipped.push((id, SkipReason::PassFailed(e.to_string())));
                }
            }
        }

        Ok(())
    }

    /// Record a retry-next-frame skip, logging once per transition into the
    /// degraded state (no per-frame spam).
    fn skip_recoverable(
        &mut self,
        id: BlockId,
        label: &str,
        reason: SkipReason,
        report: &mut FrameReport,
    ) {
        if self.degraded.insert(id) {
            log::warn!("block '{label}' did not render this frame ({reason:?}); retrying");
        }
        report.skipped.push((id, reason));
    }
}

/// The frame driver: registered subgraphs, the mode cell, boundary queues
/// and the backend, all owned by the rendering thread.
pub struct Compositor<B: RenderBackend> {
    backend: B,
    graphs: HashMap<ProgramKey, FrameGraph<B>>,
    mode: Arc<ModeCell>,
    clear_color: [f32; 4],
    reload_tx: Sender<SourceEvent>,
    reload_rx: Receiver<SourceEvent>,
    param_tx: Sender<ParamEvent>,
    param_rx: Receiver<ParamEvent>,
    /// Key of a selected-but-unregistered graph we already warned about.
    missing_logged: Option<ProgramKey>,
}

impl<B: RenderBackend> fmt::Debug for Compositor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("graphs", &self.graphs.keys().collect::<Vec<_>>())
            .field("mode", &self.mode.snapshot())
            .field("clear_color", &self.clear_color)
            .finish()
    }
}

impl<B: RenderBackend> Compositor<B> {
    pub fn new(backend: B) -> Self {
        let (reload_tx, reload_rx) = channel();
        let (param_tx, param_rx) = channel();
        Compositor {
            backend,
            graphs: HashMap::new(),
            mode: Arc::new(ModeCell::default()),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            reload_tx,
            reload_rx,
            param_tx,
            param_rx,
            missing_logged: None,
        }
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// The shared mode cell, for the control plane.
    pub fn mode_cell(&self) -> Arc<ModeCell> {
        Arc::clone(&self.mode)
    }

    /// Sender the resource collaborator pushes changed sources through.
    pub fn reload_sender(&self) -> Sender<SourceEvent> {
        self.reload_tx.clone()
    }

    /// Sender the parameter channel pushes uniform updates through.
    pub fn param_sender(&self) -> Sender<ParamEvent> {
        self.param_tx.clone()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Register a subgraph under a key, replacing (and tearing down) any
    /// previous subgraph registered under the same key.
    pub fn register(&mut self, key: ProgramKey, graph: FrameGraph<B>) {
        if let Some(mut old) = self.graphs.insert(key.clone(), graph) {
            log::debug!("replacing subgraph registered under '{key}'");
            old.teardown(&mut self.backend);
        }
    }

    pub fn graph(&self, key: &ProgramKey) -> Option<&FrameGraph<B>> {
        self.graphs.get(key)
    }

    pub fn graph_mut(&mut self, key: &ProgramKey) -> Option<&mut FrameGraph<B>> {
        self.graphs.get_mut(key)
    }

    /// Apply a mode request.
    ///
    /// A `ShaderToy` key with no registered subgraph is a `NotFound`: the
    /// request is dropped and the active mode stays what it was.
    pub fn request_mode(&mut self, mode: Mode) -> Result<(), RenderError> {
        if let Mode::ShaderToy(key) = &mode {
            if !self.graphs.contains_key(key) {
                log::warn!("mode request dropped: no subgraph registered under '{key}'");
                return Err(RenderError::NotFound {
                    key: key.to_string(),
                });
            }
        }
        self.mode.replace(mode);
        Ok(())
    }

    /// Render one frame.
    ///
    /// Boundary work first: drain the reload queue (recompile-and-swap with
    /// last-good fallback), drain and coalesce parameter updates, snapshot
    /// the mode. Then either clear the default target (`Empty`) or execute
    /// the selected subgraph. Blocks belonging to unselected subgraphs are
    /// never touched.
    pub fn run_frame(&mut self, ctx: FrameCtx) -> Result<FrameReport, RenderError> {
        let mut report = FrameReport::default();

        while let Ok(event) = self.reload_rx.try_recv() {
            let mut watchers = 0usize;
            for graph in self.graphs.values_mut() {
                for id in graph.blocks_watching(&event.key) {
                    watchers += 1;
                    let Some(block) = graph.block_mut(id) else {
                        continue;
                    };
                    match block.rebuild_from_source(&mut self.backend, &event.text) {
                        Ok(()) => log::info!("hot-swapped program '{}'", event.key),
                        Err(e) => {
                            log::error!(
                                "rebuild of '{}' failed; keeping last good program: {e}",
                                event.key
                            );
                            report.reload_failures.push((event.key.clone(), e.to_string()));
                        }
                    }
                }
            }
            if watchers == 0 {
                log::debug!("reload event for unwatched key '{}'", event.key);
            }
        }

        let mut params: HashMap<String, f32> = HashMap::new();
        while let Ok(event) = self.param_rx.try_recv() {
            // Last write wins; intermediate values within one frame are noise.
            params.insert(event.name, event.value);
        }
        for (name, value) in &params {
            for graph in self.graphs.values_mut() {
                graph.apply_param(name, *value);
            }
        }

        match self.mode.snapshot() {
            Mode::Empty => {
                self.backend
                    .clear_default_target(ctx.width, ctx.height, self.clear_color);
                report.cleared_only = true;
            }
            Mode::ShaderToy(key) => match self.graphs.get_mut(&key) {
                Some(graph) => {
                    graph.run(&mut self.backend, ctx, &mut report)?;
                    self.missing_logged = None;
                }
                None => {
                    // Unreachable through request_mode; degrade to a clear.
                    if self.missing_logged.as_ref() != Some(&key) {
                        log::warn!("active mode names unregistered subgraph '{key}'");
                        self.missing_logged = Some(key);
                    }
                    self.backend
                        .clear_default_target(ctx.width, ctx.height, self.clear_color);
                    report.cleared_only = true;
                }
            },
        }

        Ok(report)
    }

    /// Tear down every registered subgraph and hand the backend back.
    pub fn into_backend(mut self) -> B {
        let keys: Vec<ProgramKey> = self.graphs.keys().cloned().collect();
        for key in keys {
            if let Some(mut graph) = self.graphs.remove(&key) {
                graph.teardown(&mut self.backend);
            }
        }
        self.backend
    }
}
