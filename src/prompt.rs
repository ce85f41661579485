//! Operator input — a small seam between validation and terminal I/O so
//! the numeric-prompt logic is testable without a terminal.

use std::io::Write;

use thiserror::Error;

use crate::fleet::NodeId;

/// Attempts before a numeric prompt gives up on the current command.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("invalid numeric input after {0} attempts")]
    InvalidFormat(u32),
    #[error("input stream closed")]
    Closed,
}

/// Source of operator input lines.
pub trait Prompter {
    fn ask_line(&mut self, prompt: &str) -> Result<String, PromptError>;
}

/// Reads from stdin, printing the prompt to stdout.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask_line(&mut self, prompt: &str) -> Result<String, PromptError> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => Err(PromptError::Closed),
            Ok(_) => Ok(line),
            Err(_) => Err(PromptError::Closed),
        }
    }
}

/// Ask for a node id, re-prompting on bad input up to [`MAX_ATTEMPTS`].
pub fn ask_node_id(prompter: &mut impl Prompter, prompt: &str) -> Result<NodeId, PromptError> {
    for _ in 0..MAX_ATTEMPTS {
        let line = prompter.ask_line(prompt)?;
        match NodeId::parse(&line) {
            Ok(id) => return Ok(id),
            Err(e) => println!("  {e}"),
        }
    }
    Err(PromptError::InvalidFormat(MAX_ATTEMPTS))
}

/// Ask for a plain unsigned number (instance count, slot selection).
pub fn ask_number(prompter: &mut impl Prompter, prompt: &str) -> Result<u32, PromptError> {
    for _ in 0..MAX_ATTEMPTS {
        let line = prompter.ask_line(prompt)?;
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse() {
                return Ok(n);
            }
        }
        println!("  expected a plain unsigned integer, got `{trimmed}`");
    }
    Err(PromptError::InvalidFormat(MAX_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds a fixed script of lines.
    struct Scripted(Vec<&'static str>);

    impl Prompter for Scripted {
        fn ask_line(&mut self, _prompt: &str) -> Result<String, PromptError> {
            if self.0.is_empty() {
                return Err(PromptError::Closed);
            }
            Ok(self.0.remove(0).to_string())
        }
    }

    #[test]
    fn first_valid_answer_wins() {
        let mut p = Scripted(vec!["101\n"]);
        assert_eq!(ask_node_id(&mut p, "id: ").unwrap().value(), 101);
    }

    #[test]
    fn retries_then_accepts() {
        let mut p = Scripted(vec!["abc\n", "-5\n", "7\n"]);
        assert_eq!(ask_node_id(&mut p, "id: ").unwrap().value(), 7);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let mut p = Scripted(vec!["x\n", "y\n", "z\n", "8\n"]);
        assert_eq!(
            ask_node_id(&mut p, "id: "),
            Err(PromptError::InvalidFormat(3))
        );
    }

    #[test]
    fn closed_input_propagates() {
        let mut p = Scripted(vec![]);
        assert_eq!(ask_node_id(&mut p, "id: "), Err(PromptError::Closed));
    }

    #[test]
    fn ask_number_rejects_signs() {
        let mut p = Scripted(vec!["-2\n", "3\n"]);
        assert_eq!(ask_number(&mut p, "n: ").unwrap(), 3);
    }
}
