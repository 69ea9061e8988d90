use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PonderError;

/// Default reasoning mode; omitted from the task message.
pub const DEFAULT_MODE: Mode = Mode::ExploreOptimal;

/// Default reasoning language; omitted from the task message.
pub const DEFAULT_LANGUAGE: &str = "English";

/// Default step budget; omitted from the task message.
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Author of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only conversation history of a single session.
///
/// Turns strictly alternate user/assistant starting with a user turn. The
/// system prompt is never stored here; transports prepend it per call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Turn>", into = "Vec<Turn>")]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// True when the last turn is a user turn that has not been answered yet.
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.last(), Some(turn) if turn.role == Role::User)
    }

    /// Append a user turn. Only valid on an empty transcript or after an assistant turn.
    pub fn push_user(&mut self, content: impl Into<String>) -> Result<(), PonderError> {
        if self.awaiting_reply() {
            return Err(PonderError::Transcript(
                "previous user turn has no assistant reply yet".to_string(),
            ));
        }
        self.turns.push(Turn::user(content));
        Ok(())
    }

    /// Append an assistant turn. Only valid directly after a user turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<(), PonderError> {
        if !self.awaiting_reply() {
            return Err(PonderError::Transcript(
                "assistant turn must follow a user turn".to_string(),
            ));
        }
        self.turns.push(Turn::assistant(content));
        Ok(())
    }

    /// Outbound message list: the system prompt followed by every stored turn.
    pub fn with_system_prompt(&self, system_prompt: &str) -> Vec<Turn> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(Turn::system(system_prompt));
        messages.extend(self.turns.iter().cloned());
        messages
    }
}

impl TryFrom<Vec<Turn>> for Transcript {
    type Error = PonderError;

    fn try_from(turns: Vec<Turn>) -> Result<Self, Self::Error> {
        for (i, turn) in turns.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            if turn.role != expected {
                return Err(PonderError::Transcript(format!(
                    "turn {i} has role '{}', expected '{}'",
                    turn.role.as_str(),
                    expected.as_str()
                )));
            }
        }
        Ok(Self { turns })
    }
}

impl From<Transcript> for Vec<Turn> {
    fn from(transcript: Transcript) -> Self {
        transcript.turns
    }
}

/// Reasoning mode requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    ExploreOptimal,
    GoSlightlyWrong,
    GoVeryWrong,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::ExploreOptimal, Mode::GoSlightlyWrong, Mode::GoVeryWrong];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ExploreOptimal => "EXPLORE_OPTIMAL",
            Mode::GoSlightlyWrong => "GO_SLIGHTLY_WRONG",
            Mode::GoVeryWrong => "GO_VERY_WRONG",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        DEFAULT_MODE
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PonderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| PonderError::configuration(format!("unknown mode '{s}'")))
    }
}

/// Control directive that steers the next generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Command {
    Continue,
    SwitchMode(Mode),
    ReasoningLanguage(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Continue => f.write_str("CONTINUE"),
            Command::SwitchMode(mode) => f.write_str(mode.as_str()),
            Command::ReasoningLanguage(language) => write!(f, "REASONING_LANGUAGE {language}"),
        }
    }
}

impl FromStr for Command {
    type Err = PonderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        match head.to_ascii_uppercase().as_str() {
            "CONTINUE" if rest.is_empty() => Ok(Command::Continue),
            "REASONING_LANGUAGE" if !rest.is_empty() => {
                Ok(Command::ReasoningLanguage(rest.to_string()))
            }
            "REASONING_LANGUAGE" => Err(PonderError::configuration(
                "REASONING_LANGUAGE requires a language",
            )),
            _ if rest.is_empty() => trimmed.parse::<Mode>().map(Command::SwitchMode),
            _ => Err(PonderError::configuration(format!("unknown command '{s}'"))),
        }
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.to_string()
    }
}

impl TryFrom<String> for Command {
    type Error = PonderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parameters of a reasoning session, embedded into the initial task turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub task: String,
    pub mode: Mode,
    pub reasoning_language: String,
    pub max_steps: u32,
}

impl SessionOptions {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            mode: DEFAULT_MODE,
            reasoning_language: DEFAULT_LANGUAGE.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.reasoning_language = language.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}
