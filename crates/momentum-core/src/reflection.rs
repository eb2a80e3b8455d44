//! Post-session reflection answers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// "Did you start something meaningful?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Meaningful {
    Yes,
    No,
}

/// "Did you get stuck perfecting details?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Perfectionism {
    Yes,
    No,
    Unsure,
}

impl FromStr for Meaningful {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Self::Yes),
            "no" | "n" => Ok(Self::No),
            other => Err(format!("expected yes or no, got '{other}'")),
        }
    }
}

impl FromStr for Perfectionism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Self::Yes),
            "no" | "n" => Ok(Self::No),
            "unsure" | "u" => Ok(Self::Unsure),
            other => Err(format!("expected yes, no or unsure, got '{other}'")),
        }
    }
}

impl fmt::Display for Meaningful {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => f.write_str("Yes"),
            Self::No => f.write_str("No"),
        }
    }
}

impl fmt::Display for Perfectionism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => f.write_str("Yes"),
            Self::No => f.write_str("No"),
            Self::Unsure => f.write_str("Unsure"),
        }
    }
}

/// Answers collected during the reflection phase.
///
/// Field names on the wire match the session log written by the browser
/// version of the timer (`meaningful`, `perfectionism`, `nextTask`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    #[serde(default)]
    pub meaningful: Option<Meaningful>,
    #[serde(default)]
    pub perfectionism: Option<Perfectionism>,
    #[serde(default)]
    pub next_task: String,
}

impl Reflection {
    /// Both required questions have an answer.
    pub fn is_complete(&self) -> bool {
        self.meaningful.is_some() && self.perfectionism.is_some()
    }

    pub fn apply(&mut self, field: ReflectionField) {
        match field {
            ReflectionField::Meaningful(v) => self.meaningful = Some(v),
            ReflectionField::Perfectionism(v) => self.perfectionism = Some(v),
            ReflectionField::NextTask(note) => self.next_task = note,
        }
    }
}

/// A single reflection answer coming from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ReflectionField {
    Meaningful(Meaningful),
    Perfectionism(Perfectionism),
    NextTask(String),
}

impl ReflectionField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Meaningful(_) => "meaningful",
            Self::Perfectionism(_) => "perfectionism",
            Self::NextTask(_) => "next_task",
        }
    }
}
