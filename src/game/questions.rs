//! Question deck: prompts drawn at the start of each writing stage.

use std::path::Path;

use rand::seq::IndexedRandom;

const BUILTIN_QUESTIONS: &str = include_str!("questions.txt");
const FALLBACK_QUESTION: &str = "What is the worst thing to say at a job interview?";

#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("failed to read question file: {0}")]
    Io(#[from] std::io::Error),
    #[error("question deck is empty")]
    Empty,
}

/// A non-empty list of prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDeck {
    questions: Vec<String>,
}

impl QuestionDeck {
    /// One question per line; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::Empty` if no line carries a question.
    pub fn parse(text: &str) -> Result<Self, QuestionError> {
        let questions: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        if questions.is_empty() {
            return Err(QuestionError::Empty);
        }
        Ok(Self { questions })
    }

    /// Load a deck from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds no questions.
    pub fn from_file(path: &Path) -> Result<Self, QuestionError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// The deck compiled into the binary.
    #[must_use]
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_QUESTIONS).unwrap_or_else(|_| Self { questions: vec![FALLBACK_QUESTION.to_owned()] })
    }

    /// Pick a random question.
    #[must_use]
    pub fn draw(&self) -> String {
        self.questions
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[cfg(test)]
    fn contains(&self, question: &str) -> bool {
        self.questions.iter().any(|q| q == question)
    }
}
