// UI layer: terminal prompts (dialoguer), colored status lines (crossterm)
// and the polling spinner (indicatif). Command code talks to the user only
// through this module so the flows can run unattended or under test.

use crate::error::ZatError;
use anyhow::Result;
use crossterm::style::{style, Attribute, Color, Stylize};
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Source of answers for values the command line did not provide.
pub trait Prompter {
    /// Ask for a plain value, offering `default` when there is one.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;
    /// Ask for a value without echoing it.
    fn secret(&self, prompt: &str) -> Result<String>;
}

/// Interactive prompter backed by `dialoguer`. With `unattended` set it never
/// touches the terminal: defaults are taken as-is and anything else fails.
pub struct TerminalPrompter {
    unattended: bool,
}

impl TerminalPrompter {
    pub fn new(unattended: bool) -> Self {
        Self { unattended }
    }
}

impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        if self.unattended {
            return default
                .map(str::to_string)
                .ok_or_else(|| ZatError::MissingInput(prompt.to_string()).into());
        }
        let mut input = Input::<String>::new();
        input.with_prompt(prompt);
        if let Some(default) = default {
            input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn secret(&self, prompt: &str) -> Result<String> {
        if self.unattended {
            anyhow::bail!(ZatError::MissingInput(prompt.to_string()));
        }
        Ok(Password::new().with_prompt(prompt).interact()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Info => Color::Cyan,
            Tone::Success => Color::Green,
            Tone::Warning => Color::Yellow,
            Tone::Error => Color::Red,
        }
    }
}

/// Print a right-aligned, colored label followed by the message.
pub fn say_status(label: &str, message: &str, tone: Tone) {
    let label = style(format!("{:>12}", label))
        .with(tone.color())
        .attribute(Attribute::Bold);
    println!("{}  {}", label, message);
}

/// Print an error to stderr in red.
pub fn say_error(message: &str) {
    eprintln!("{}", format!("Error: {}", message).red());
}

/// Spinner shown while waiting on the platform.
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Prompter;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Answers prompts from a fixed script and records what was asked.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        answers: RefCell<VecDeque<String>>,
        pub asked: RefCell<Vec<String>>,
    }

    impl ScriptedPrompter {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
                asked: RefCell::new(Vec::new()),
            }
        }

        fn next(&self, prompt: &str) -> Result<String> {
            self.asked.borrow_mut().push(prompt.to_string());
            self.answers
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("unexpected prompt: {}", prompt))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
            let answer = self.next(prompt)?;
            match (answer.is_empty(), default) {
                (true, Some(default)) => Ok(default.to_string()),
                _ => Ok(answer),
            }
        }

        fn secret(&self, prompt: &str) -> Result<String> {
            self.next(prompt)
        }
    }
}
