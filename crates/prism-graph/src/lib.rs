#![forbid(unsafe_code)]

//! prism compositing-graph vocabulary.
//!
//! This crate is **contract-only**: no GL handles, no programs, no frame
//! timing. It models one frame as an acyclic arrangement of render blocks
//! with typed ports, and computes the deterministic execution order the
//! runtime walks. Blocks live in an arena addressed by [`BlockId`]; edges are
//! an adjacency list of typed connections, so there are no pointer cycles to
//! manage.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

use std::collections::BinaryHeap;
use std::fmt;

use prism_core::{RenderError, UniformValue};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BlockId(pub u32);

/// What a block input port accepts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InputKind {
    /// An upstream block's color output, routed by an edge.
    Texture,
    /// A per-frame staged value; never the target of an edge.
    UniformValue,
}

/// Where a block's output goes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OutputKind {
    /// An offscreen color attachment consumable by downstream blocks.
    ColorAttachment,
    /// The default framebuffer. Exactly one block per graph writes it.
    DefaultTarget,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TargetFormat {
    Rgba8,
    Rgba16F,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputPort {
    pub name: String,
    pub kind: InputKind,
    /// Fallback for `UniformValue` ports with nothing staged. A valueless,
    /// unstated uniform port keeps the block out of the frame.
    pub default: Option<UniformValue>,
}

impl InputPort {
    pub fn texture(name: impl Into<String>) -> Self {
        InputPort {
            name: name.into(),
            kind: InputKind::Texture,
            default: None,
        }
    }

    pub fn value(name: impl Into<String>) -> Self {
        InputPort {
            name: name.into(),
            kind: InputKind::UniformValue,
            default: None,
        }
    }

    pub fn value_with_default(name: impl Into<String>, default: UniformValue) -> Self {
        InputPort {
            name: name.into(),
            kind: InputKind::UniformValue,
            default: Some(default),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputPort {
    pub kind: OutputKind,
    pub format: TargetFormat,
}

impl OutputPort {
    pub fn color(format: TargetFormat) -> Self {
        OutputPort {
            kind: OutputKind::ColorAttachment,
            format,
        }
    }

    pub fn default_target() -> Self {
        OutputPort {
            kind: OutputKind::DefaultTarget,
            format: TargetFormat::Rgba8,
        }
    }
}

/// A block descriptor in the arena. The runtime pairs it with the program
/// and backend resources under the same [`BlockId`].
#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    pub label: String,
    pub inputs: Vec<InputPort>,
    pub output: OutputPort,
}

/// A typed connection: `from`'s color output into `to`'s input port.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    /// Index into the destination block's `inputs`.
    pub to_port: usize,
}

/// Structural graph errors. All of them are construction-time: a graph that
/// schedules cleanly stays clean until the next mutation.
#[derive(Debug)]
pub enum GraphError {
    UnknownBlock(BlockId),
    UnknownPort { block: BlockId, port: String },
    TypeMismatch { from: BlockId, to: BlockId, port: String, detail: String },
    PortInUse { to: BlockId, port: String },
    Cycle { from: BlockId, to: BlockId },
    UnboundInput { block: BlockId, port: String },
    NoTerminal,
    MultipleTerminals { first: BlockId, second: BlockId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownBlock(id) => write!(f, "block {id:?} is not in this graph"),
            GraphError::UnknownPort { block, port } => {
                write!(f, "block {block:?} has no input port '{port}'")
            }
            GraphError::TypeMismatch {
                from,
                to,
                port,
                detail,
            } => write!(
                f,
                "cannot connect {from:?} to {to:?} port '{port}': {detail}"
            ),
            GraphError::PortInUse { to, port } => {
                write!(f, "input port '{port}' of {to:?} already has a driver")
            }
            GraphError::Cycle { from, to } => {
                write!(f, "connecting {from:?} to {to:?} would create a cycle")
            }
            GraphError::UnboundInput { block, port } => {
                write!(f, "texture input '{port}' of {block:?} is not connected")
            }
            GraphError::NoTerminal => write!(f, "no block writes the default target"),
            GraphError::MultipleTerminals { first, second } => write!(
                f,
                "both {first:?} and {second:?} write the default target"
            ),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<GraphError> for RenderError {
    fn from(e: GraphError) -> Self {
        RenderError::Graph { msg: e.to_string() }
    }
}

/// The computed execution order for one graph revision.
///
/// `order` is a topological sort with a stable tie-break: among blocks whose
/// dependencies are all satisfied, insertion order wins. Two calls over an
/// unmodified graph return the same order, so a deterministic graph renders
/// deterministically.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    pub revision: u64,
    pub order: Vec<BlockId>,
    /// Non-terminal blocks whose output feeds nothing. Diagnosed, never
    /// silently dropped; the runtime skips and reports them.
    pub dead: Vec<BlockId>,
}

#[derive(Debug, Default)]
pub struct Graph {
    blocks: Vec<Block>,
    edges: Vec<Edge>,
    revision: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every mutation; hosts cache the [`Schedule`] against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    pub fn add_block(
        &mut self,
        label: impl Into<String>,
        inputs: Vec<InputPort>,
        output: OutputPort,
    ) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            label: label.into(),
            inputs,
            output,
        });
        self.revision += 1;
        id
    }

    /// The block driving `to`'s input port, if connected.
    pub fn producer_of(&self, to: BlockId, to_port: usize) -> Option<BlockId> {
        self.edges
            .iter()
            .find(|e| e.to == to && e.to_port == to_port)
            .map(|e| e.from)
    }

    /// Connect `from`'s color output into `to`'s named input port.
    ///
    /// On any failure the graph is left exactly as it was.
    pub fn connect(&mut self, from: BlockId, to: BlockId, port: &str) -> Result<(), GraphError> {
        let from_block = self.block(from).ok_or(GraphError::UnknownBlock(from))?;
        let to_block = self.block(to).ok_or(GraphError::UnknownBlock(to))?;

        let to_port = to_block
            .inputs
            .iter()
            .position(|p| p.name == port)
            .ok_or_else(|| GraphError::UnknownPort {
                block: to,
                port: port.to_string(),
            })?;

        if to_block.inputs[to_port].kind != InputKind::Texture {
            return Err(GraphError::TypeMismatch {
                from,
                to,
                port: port.to_string(),
                detail: "uniform-value ports take staged values, not edges".to_string(),
            });
        }
        if from_block.output.kind != OutputKind::ColorAttachment {
            return Err(GraphError::TypeMismatch {
                from,
                to,
                port: port.to_string(),
                detail: "the default target cannot feed another block".to_string(),
            });
        }
        if self.edges.iter().any(|e| e.to == to && e.to_port == to_port) {
            return Err(GraphError::PortInUse {
                to,
                port: port.to_string(),
            });
        }
        // from == to is the degenerate cycle; reaches covers the transitive case.
        if from == to || self.reaches(to, from) {
            return Err(GraphError::Cycle { from, to });
        }

        self.edges.push(Edge { from, to, to_port });
        self.revision += 1;
        Ok(())
    }

    /// Is `goal` reachable from `start` by following edges downstream?
    fn reaches(&self, start: BlockId, goal: BlockId) -> bool {
        let mut stack = vec![start];
        let mut visited = vec![false; self.blocks.len()];

        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if std::mem::replace(&mut visited[id.0 as usize], true) {
                continue;
            }
            for e in &self.edges {
                if e.from == id {
                    stack.push(e.to);
                }
            }
        }
        false
    }

    /// Validate the graph structure and compute the execution order.
    ///
    /// Fails on a missing/ambiguous terminal and on any unconnected texture
    /// input; a graph that fails here must not be run.
    pub fn schedule(&self) -> Result<Schedule, GraphError> {
        let mut terminal: Option<BlockId> = None;
        for b in &self.blocks {
            if b.output.kind == OutputKind::DefaultTarget {
                match terminal {
                    None => terminal = Some(b.id),
                    Some(first) => {
                        return Err(GraphError::MultipleTerminals {
                            first,
                            second: b.id,
                        })
                    }
                }
            }
        }
        let terminal = terminal.ok_or(GraphError::NoTerminal)?;

        for b in &self.blocks {
            for (i, p) in b.inputs.iter().enumerate() {
                if p.kind == InputKind::Texture && self.producer_of(b.id, i).is_none() {
                    return Err(GraphError::UnboundInput {
                        block: b.id,
                        port: p.name.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm. The ready set is a min-heap over BlockId, and ids
        // are handed out in insertion order, which gives the stable tie-break.
        let mut indegree = vec![0usize; self.blocks.len()];
        for e in &self.edges {
            indegree[e.to.0 as usize] += 1;
        }

        let mut ready: BinaryHeap<std::cmp::Reverse<BlockId>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| std::cmp::Reverse(BlockId(i as u32)))
            .collect();

        let mut order = Vec::with_capacity(self.blocks.len());
        while let Some(std::cmp::Reverse(id)) = ready.pop() {
            order.push(id);
            for e in &self.edges {
                if e.from == id {
                    let d = &mut indegree[e.to.0 as usize];
                    *d -= 1;
                    if *d == 0 {
                        ready.push(std::cmp::Reverse(e.to));
                    }
                }
            }
        }

        // connect() rejects cycles, so every block is emitted.
        debug_assert_eq!(order.len(), self.blocks.len());

        let dead = self
            .blocks
            .iter()
            .filter(|b| b.id != terminal && !self.edges.iter().any(|e| e.from == b.id))
            .map(|b| b.id)
            .collect();

        Ok(Schedule {
            revision: self.revision,
            order,
            dead,
        })
    }
}
