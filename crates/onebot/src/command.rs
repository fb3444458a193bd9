/// Marker that opens a command.
pub const COMMAND_MARKER: char = '/';

/// A `/name arg1 arg2` command. `name` excludes the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let name = tokens.next()?.strip_prefix(COMMAND_MARKER)?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: tokens.map(str::to_string).collect(),
        })
    }
}
