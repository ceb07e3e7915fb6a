//! Splitting a program blob into per-stage sources.

use prism_core::RenderError;

use crate::stage::{StageKind, StageSource};

/// Split one source blob into its ordered stage sections.
///
/// This is a pure text partition: a single pass over the input, no
/// shading-language validation. Sections come back in declaration order;
/// pipeline-order and presence checks happen at link time, where the
/// offending program can be named.
///
/// Errors:
/// - a non-blank, non-`//` line before the first pragma (`NoStageDeclared`),
/// - a `#`-token in pragma position that is not a known stage
///   (`UnknownMarker`),
/// - the same pragma twice (`DuplicateStage`),
/// - a pragma with no following text (`EmptyStage`),
/// - a blob with no pragma at all (`EmptySource`).
pub fn split_stages(src: &str) -> Result<Vec<StageSource>, RenderError> {
    let mut sections: Vec<StageSource> = Vec::new();
    let mut open: Option<usize> = None;

    for (idx, line) in src.lines().enumerate() {
        let line_nb = idx + 1;
        let trimmed = line.trim_start();
        let token = trimmed.split_whitespace().next();

        if let Some(token) = token {
            if let Some(kind) = StageKind::from_marker(token) {
                if sections.iter().any(|s| s.kind == kind) {
                    return Err(RenderError::DuplicateStage {
                        line: line_nb,
                        marker: kind.short_name(),
                    });
                }

                open = Some(sections.len());
                sections.push(StageSource {
                    kind,
                    text: String::new(),
                    first_line: line_nb + 1,
                });
                continue;
            }
        }

        match open {
            Some(i) => {
                // Inside a stage every line is opaque, including the shading
                // language's own `#` preprocessor lines.
                sections[i].text.push_str(line);
                sections[i].text.push('\n');
            }
            None => {
                let trimmed = trimmed.trim_end();
                if trimmed.is_empty() || trimmed.starts_with("//") {
                    continue;
                }
                if trimmed.starts_with('#') {
                    return Err(RenderError::UnknownMarker {
                        line: line_nb,
                        token: trimmed
                            .split_whitespace()
                            .next()
                            .unwrap_or(trimmed)
                            .to_string(),
                    });
                }
                return Err(RenderError::NoStageDeclared { line: line_nb });
            }
        }
    }

    if sections.is_empty() {
        return Err(RenderError::EmptySource);
    }

    for s in &sections {
        if s.text.trim().is_empty() {
            return Err(RenderError::EmptyStage {
                line: s.first_line - 1,
                marker: s.kind.short_name(),
            });
        }
    }

    Ok(sections)
}
