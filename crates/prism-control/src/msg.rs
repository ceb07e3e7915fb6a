use prism_core::{Mode, ProgramKey};
use serde::{Deserialize, Serialize};

/// A control-panel message.
///
/// Wire shape is the externally-tagged JSON encoding: `"empty_mode"`,
/// `{"shader_toy": "<key>"}`, `"close"`. No other shapes are defined.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Msg {
    /// Close the host frame loop.
    Close,
    /// Enter empty mode.
    EmptyMode,
    /// Enter shader toy mode with the given shader program.
    ShaderToy(String),
}

impl Msg {
    /// The mode transition this message requests, if it is one.
    pub fn to_mode(&self) -> Option<Mode> {
        match self {
            Msg::EmptyMode => Some(Mode::Empty),
            Msg::ShaderToy(key) => Some(Mode::ShaderToy(ProgramKey::new(key))),
            Msg::Close => None,
        }
    }
}

/// Parse one message line.
pub fn parse_msg(line: &str) -> Result<Msg, serde_json::Error> {
    serde_json::from_str(line)
}
