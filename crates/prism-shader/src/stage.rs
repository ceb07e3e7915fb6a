/// One shading pipeline phase.
///
/// The derived ordering is the pipeline order: vertex precedes geometry
/// precedes fragment. Program validation relies on it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StageKind {
    Vertex,
    Geometry,
    Fragment,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Vertex, StageKind::Geometry, StageKind::Fragment];

    /// The pragma introducing this stage in a source blob.
    pub fn marker(self) -> &'static str {
        match self {
            StageKind::Vertex => "#vs",
            StageKind::Geometry => "#gs",
            StageKind::Fragment => "#fs",
        }
    }

    /// Short name, as spelled in the pragma (without the `#`).
    pub fn short_name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vs",
            StageKind::Geometry => "gs",
            StageKind::Fragment => "fs",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Geometry => "geometry",
            StageKind::Fragment => "fragment",
        }
    }

    /// Recognize a pragma token. Matching is exact and case-sensitive.
    pub fn from_marker(token: &str) -> Option<StageKind> {
        StageKind::ALL.iter().copied().find(|k| k.marker() == token)
    }
}

/// One stage's source text, cut out of a program blob.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StageSource {
    pub kind: StageKind,

    /// The stage text, verbatim, from the line after the pragma up to the
    /// next pragma or end of file.
    pub text: String,

    /// 1-based line number of the first text line within the original blob,
    /// so backend diagnostics can be mapped back to the multi-stage file.
    pub first_line: usize,
}
