//! Where the next steering command comes from: a person at the terminal or
//! an automatic policy.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::ValueEnum;
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;

use ponder_core::{Command, Mode};

use crate::terminal_output::{format_command_menu, paint, MENU, RED, YELLOW};

pub trait CommandSource {
    /// Next command, or `None` to end the session.
    fn next_command(&mut self) -> Result<Option<Command>>;

    /// Automatic sources are bounded by `max_steps`; people are not.
    fn is_automatic(&self) -> bool;
}

/// Command policy for `--auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AutoMode {
    /// Always CONTINUE
    #[default]
    Continue,
    /// Random pick among CONTINUE and the three modes
    Vary,
    /// Always GO_VERY_WRONG
    Wrong,
}

fn vary_pool() -> [Command; 4] {
    [
        Command::Continue,
        Command::SwitchMode(Mode::ExploreOptimal),
        Command::SwitchMode(Mode::GoSlightlyWrong),
        Command::SwitchMode(Mode::GoVeryWrong),
    ]
}

pub struct AutoCommands<R = ThreadRng> {
    mode: AutoMode,
    rng: R,
}

impl AutoCommands {
    pub fn new(mode: AutoMode) -> Self {
        Self::with_rng(mode, rand::thread_rng())
    }
}

impl<R: Rng> AutoCommands<R> {
    pub fn with_rng(mode: AutoMode, rng: R) -> Self {
        Self { mode, rng }
    }

    pub fn pick(&mut self) -> Command {
        match self.mode {
            AutoMode::Continue => Command::Continue,
            AutoMode::Wrong => Command::SwitchMode(Mode::GoVeryWrong),
            AutoMode::Vary => vary_pool()
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or(Command::Continue),
        }
    }
}

impl<R: Rng> CommandSource for AutoCommands<R> {
    fn next_command(&mut self) -> Result<Option<Command>> {
        Ok(Some(self.pick()))
    }

    fn is_automatic(&self) -> bool {
        true
    }
}

/// What a line typed at the menu prompt means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Command(Command),
    /// `REASONING_LANGUAGE` without a language; ask for one.
    AskLanguage,
    Exit,
    Invalid,
}

/// Accepts a menu number, a command name, or `REASONING_LANGUAGE <lang>`.
/// An empty line picks the first entry.
pub fn parse_menu_choice(input: &str) -> MenuChoice {
    let trimmed = input.trim();
    let selected = if trimmed.is_empty() {
        MENU[0]
    } else if let Ok(n) = trimmed.parse::<usize>() {
        match n.checked_sub(1).and_then(|i| MENU.get(i)) {
            Some(entry) => *entry,
            None => return MenuChoice::Invalid,
        }
    } else {
        trimmed
    };

    match selected.to_ascii_uppercase().as_str() {
        "EXIT" => MenuChoice::Exit,
        "REASONING_LANGUAGE" => MenuChoice::AskLanguage,
        _ => selected
            .parse::<Command>()
            .map(MenuChoice::Command)
            .unwrap_or(MenuChoice::Invalid),
    }
}

/// Reads choices from a terminal. End of input counts as `EXIT`.
pub struct InteractiveCommands<R, W> {
    input: R,
    output: W,
}

impl InteractiveCommands<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> InteractiveCommands<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from terminal")?;
        Ok((read > 0).then(|| line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> CommandSource for InteractiveCommands<R, W> {
    fn next_command(&mut self) -> Result<Option<Command>> {
        writeln!(self.output, "{}", format_command_menu())?;
        loop {
            let Some(line) = self.prompt(&paint(YELLOW, "Choice [1]"))? else {
                return Ok(None);
            };
            match parse_menu_choice(&line) {
                MenuChoice::Command(command) => return Ok(Some(command)),
                MenuChoice::Exit => return Ok(None),
                MenuChoice::AskLanguage => loop {
                    let Some(language) = self.prompt(&paint(YELLOW, "Language"))? else {
                        return Ok(None);
                    };
                    if !language.is_empty() {
                        return Ok(Some(Command::ReasoningLanguage(language)));
                    }
                    writeln!(self.output, "{}", paint(RED, "A language is required"))?;
                },
                MenuChoice::Invalid => writeln!(self.output, "{}", paint(RED, "Invalid choice"))?,
            }
        }
    }

    fn is_automatic(&self) -> bool {
        false
    }
}
