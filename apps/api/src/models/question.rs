use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Behavioral,
    Technical,
    Situational,
    Coding,
    SqlQueryWriting,
    PythonDataScience,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = [
        QuestionType::Behavioral,
        QuestionType::Technical,
        QuestionType::Situational,
        QuestionType::Coding,
        QuestionType::SqlQueryWriting,
        QuestionType::PythonDataScience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Behavioral => "behavioral",
            QuestionType::Technical => "technical",
            QuestionType::Situational => "situational",
            QuestionType::Coding => "coding",
            QuestionType::SqlQueryWriting => "sql_query_writing",
            QuestionType::PythonDataScience => "python_data_science",
        }
    }

    /// Strict parse of the snake_case tag.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Lenient parse for model output and legacy rows: case, spaces and hyphens
    /// are ignored; anything unrecognized becomes `Behavioral`.
    pub fn normalize(value: &str) -> Self {
        let key = value
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");
        Self::parse(&key).unwrap_or_default()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored interview question. Created by generation and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub category: String,
    pub created_at: DateTime<Utc>,
}
