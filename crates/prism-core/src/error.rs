use std::fmt;
use std::path::PathBuf;

/// Engine-level errors used across prism crates.
///
/// Contract rule: this type lives in `prism-core` and can be re-exported by
/// runtimes. Build failures (parse, compile, link) are always returned as
/// values; nothing in this subsystem takes the host process down.
#[derive(Debug)]
pub enum RenderError {
    // ---- Config / io ----
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    InvalidConfig {
        path: PathBuf,
        msg: String,
    },

    // ---- Stage splitting ----
    /// Source text appeared before the first stage marker.
    NoStageDeclared {
        line: usize,
    },

    /// A `#`-token in marker position did not name a known stage.
    UnknownMarker {
        line: usize,
        token: String,
    },

    /// The same stage marker appeared twice in one blob.
    DuplicateStage {
        line: usize,
        marker: &'static str,
    },

    /// A marker with no stage text following it.
    EmptyStage {
        line: usize,
        marker: &'static str,
    },

    /// The blob contained no stage sections at all.
    EmptySource,

    // ---- Compile / link ----
    /// The backend rejected one stage's text.
    Compile {
        stage: &'static str,
        origin: String,
        log: String,
    },

    /// A mutually required stage was absent.
    MissingStage {
        origin: String,
        stage: &'static str,
    },

    /// Stages were declared out of pipeline order.
    StageOrder {
        origin: String,
        found: &'static str,
        after: &'static str,
    },

    /// An `in` of a later stage has no matching `out` in the stage before it,
    /// or the two declarations disagree on type.
    VaryingMismatch {
        origin: String,
        symbol: String,
        from_stage: &'static str,
        to_stage: &'static str,
        detail: String,
    },

    /// The same symbol is declared with conflicting types in two stages.
    SymbolTypeConflict {
        origin: String,
        symbol: String,
        first: String,
        second: String,
    },

    /// The backend linker rejected the program.
    Link {
        origin: String,
        log: String,
    },

    /// Backend object creation failed.
    GlCreate(String),

    // ---- Blocks / graph / frame ----
    /// `set_uniform` named a uniform absent from the program directory.
    UnknownUniform {
        name: String,
    },

    /// A staged value's type disagrees with the program's declaration.
    UniformTypeMismatch {
        name: String,
        declared: String,
        provided: String,
    },

    /// Bound inputs do not match the block's declared ports.
    PortMismatch {
        block: String,
        detail: String,
    },

    /// A required input port had neither a staged value nor a default at
    /// frame time.
    UnboundInput {
        block: String,
        port: String,
    },

    /// Structural graph error (cycle, type mismatch, unbound input, ...).
    Graph {
        msg: String,
    },

    /// A mode request named a key with no registered subgraph.
    NotFound {
        key: String,
    },

    /// The block cannot run this frame (program still building). Absorbed by
    /// the frame driver, retried next frame.
    NotReady {
        block: String,
    },

    // ---- Fallback ----
    Other(String),
}

impl RenderError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        RenderError::Other(s.into())
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io { path, source } => {
                write!(f, "io error at {}: {}", path.display(), source)
            }
            RenderError::Json { path, source } => {
                write!(f, "json parse error at {}: {}", path.display(), source)
            }
            RenderError::InvalidConfig { path, msg } => {
                write!(f, "invalid config at {}: {}", path.display(), msg)
            }

            RenderError::NoStageDeclared { line } => {
                write!(f, "(line {line}) source text before any stage marker")
            }
            RenderError::UnknownMarker { line, token } => {
                write!(f, "(line {line}) unknown stage marker '{token}'")
            }
            RenderError::DuplicateStage { line, marker } => {
                write!(f, "(line {line}) several #{marker} sections")
            }
            RenderError::EmptyStage { line, marker } => {
                write!(f, "(line {line}) #{marker} section has no text")
            }
            RenderError::EmptySource => write!(f, "source contains no stage sections"),

            RenderError::Compile { stage, origin, log } => {
                write!(f, "{stage} stage of {origin} failed to compile: {log}")
            }
            RenderError::MissingStage { origin, stage } => {
                write!(f, "{origin} has no {stage} stage")
            }
            RenderError::StageOrder {
                origin,
                found,
                after,
            } => {
                write!(f, "{origin}: {found} stage declared after {after} stage")
            }
            RenderError::VaryingMismatch {
                origin,
                symbol,
                from_stage,
                to_stage,
                detail,
            } => {
                write!(
                    f,
                    "{origin}: varying '{symbol}' between {from_stage} and {to_stage} stages: {detail}"
                )
            }
            RenderError::SymbolTypeConflict {
                origin,
                symbol,
                first,
                second,
            } => {
                write!(
                    f,
                    "{origin}: '{symbol}' declared both as {first} and as {second}"
                )
            }
            RenderError::Link { origin, log } => {
                write!(f, "{origin} failed to link: {log}")
            }
            RenderError::GlCreate(msg) => write!(f, "backend object creation failed: {msg}"),

            RenderError::UnknownUniform { name } => write!(f, "unknown uniform '{name}'"),
            RenderError::UniformTypeMismatch {
                name,
                declared,
                provided,
            } => {
                write!(
                    f,
                    "uniform '{name}' is declared {declared} but a {provided} was staged"
                )
            }
            RenderError::PortMismatch { block, detail } => {
                write!(f, "port mismatch on block '{block}': {detail}")
            }
            RenderError::UnboundInput { block, port } => {
                write!(f, "input '{port}' of block '{block}' has no value bound")
            }
            RenderError::Graph { msg } => write!(f, "graph error: {msg}"),
            RenderError::NotFound { key } => write!(f, "no subgraph registered under '{key}'"),
            RenderError::NotReady { block } => {
                write!(f, "block '{block}' is not ready to render")
            }

            RenderError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io { source, .. } => Some(source),
            RenderError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
