/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Voice(bool),
    /// Drop queued speech and silence the current sentence.
    Stop,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let mut words = rest.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("quit" | "exit"), None, _) => Command::Quit,
            (Some("stop"), None, _) => Command::Stop,
            (Some("voice"), Some(flag), None) => match crate::config::parse_flag(flag) {
                Some(on) => Command::Voice(on),
                None => Command::Unknown(line.to_string()),
            },
            _ => Command::Unknown(line.to_string()),
        }
    }
}

pub const HELP: &str = "commands: /voice on|off, /stop, /quit";
