//! Textual stage-interface scanning.
//!
//! Link-time varying checks compare an explicit symbol table built from the
//! stage text instead of relying on the backend's implicit matching, so a
//! mismatch names the symbol and both offending stages.
//!
//! The scanner is intentionally shallow: it understands the top-level
//! declaration forms the stage format uses (`in`/`out`/`uniform`, optional
//! `layout(..)` and interpolation qualifiers) and ignores everything else.

use prism_core::RenderError;

use crate::stage::StageKind;

/// One `in`/`out`/`uniform` declaration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VarDecl {
    pub ty: String,
    pub name: String,
}

/// The declared interface of one stage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StageInterface {
    pub inputs: Vec<VarDecl>,
    pub outputs: Vec<VarDecl>,
    pub uniforms: Vec<VarDecl>,
}

impl StageInterface {
    fn output(&self, name: &str) -> Option<&VarDecl> {
        self.outputs.iter().find(|v| v.name == name)
    }
}

/// Strip `//` and `/* */` comments, preserving everything else.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' {
            match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

const SKIPPED_QUALIFIERS: [&str; 7] = [
    "flat",
    "smooth",
    "noperspective",
    "centroid",
    "highp",
    "mediump",
    "lowp",
];

/// Scan one stage's text for its declared interface.
pub fn scan_interface(text: &str) -> StageInterface {
    let clean = strip_comments(text);
    let mut iface = StageInterface::default();

    for stmt in clean.split(';') {
        // `#` preprocessor lines are opaque; drop them before tokenizing.
        let stmt: String = stmt
            .lines()
            .filter(|l| !l.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join(" ");

        let mut tokens = stmt.split_whitespace().peekable();

        // Optional layout(..) qualifier. The statement splitter guarantees it
        // carries no ';', so it is a balanced token run we can skip whole.
        if tokens.peek().is_some_and(|t| t.starts_with("layout")) {
            let mut depth = 0i32;
            for tok in tokens.by_ref() {
                depth += tok.matches('(').count() as i32;
                depth -= tok.matches(')').count() as i32;
                if depth <= 0 && tok.contains(')') {
                    break;
                }
            }
        }

        while tokens
            .peek()
            .is_some_and(|t| SKIPPED_QUALIFIERS.contains(t))
        {
            tokens.next();
        }

        let Some(qualifier) = tokens.next() else {
            continue;
        };
        if qualifier != "in" && qualifier != "out" && qualifier != "uniform" {
            continue;
        }

        while tokens
            .peek()
            .is_some_and(|t| SKIPPED_QUALIFIERS.contains(t))
        {
            tokens.next();
        }

        let Some(ty) = tokens.next() else { continue };
        let Some(name) = tokens.next() else { continue };

        // A declaration is exactly `qualifier type name`; anything longer is
        // a function signature or something else we do not track.
        if tokens.next().is_some() {
            continue;
        }

        // Array declarations keep the base name only.
        let name = name.split('[').next().unwrap_or(name);
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }

        let decl = VarDecl {
            ty: ty.to_string(),
            name: name.to_string(),
        };
        match qualifier {
            "in" => iface.inputs.push(decl),
            "out" => iface.outputs.push(decl),
            _ => iface.uniforms.push(decl),
        }
    }

    iface
}

/// Check cross-stage varyings over stages given in pipeline order.
///
/// Every `in` of a later stage must be produced as a same-typed `out` by the
/// stage immediately before it. The first stage's inputs are vertex
/// attributes and the last stage's outputs are color outputs; neither takes
/// part. Builtins (`gl_*`) are the backend's business.
pub fn check_varyings(
    stages: &[(StageKind, StageInterface)],
    origin: &str,
) -> Result<(), RenderError> {
    for pair in stages.windows(2) {
        let (prev_kind, prev) = &pair[0];
        let (next_kind, next) = &pair[1];

        for input in &next.inputs {
            if input.name.starts_with("gl_") {
                continue;
            }
            match prev.output(&input.name) {
                None => {
                    return Err(RenderError::VaryingMismatch {
                        origin: origin.to_string(),
                        symbol: input.name.clone(),
                        from_stage: prev_kind.name(),
                        to_stage: next_kind.name(),
                        detail: format!("consumed as in but never produced as out by the {} stage", prev_kind.name()),
                    });
                }
                Some(out) if out.ty != input.ty => {
                    return Err(RenderError::VaryingMismatch {
                        origin: origin.to_string(),
                        symbol: input.name.clone(),
                        from_stage: prev_kind.name(),
                        to_stage: next_kind.name(),
                        detail: format!("produced as {} but consumed as {}", out.ty, input.ty),
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

/// Merge the uniform declarations of every stage into one directory.
///
/// A name declared with conflicting types in two stages is a link error
/// naming the symbol.
pub fn merge_uniforms(
    stages: &[(StageKind, StageInterface)],
    origin: &str,
) -> Result<Vec<VarDecl>, RenderError> {
    let mut merged: Vec<VarDecl> = Vec::new();

    for (_, iface) in stages {
        for uni in &iface.uniforms {
            match merged.iter().find(|m| m.name == uni.name) {
                None => merged.push(uni.clone()),
                Some(prev) if prev.ty != uni.ty => {
                    return Err(RenderError::SymbolTypeConflict {
                        origin: origin.to_string(),
                        symbol: uni.name.clone(),
                        first: prev.ty.clone(),
                        second: uni.ty.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(merged)
}
