use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record shape the normalizer can recover from model output.
pub trait Record: DeserializeOwned {
    /// Shape checks beyond what deserialization enforces.
    fn is_valid(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl Record for QuizItem {
    fn is_valid(&self) -> bool {
        let unique: HashSet<&str> = self.options.iter().map(String::as_str).collect();
        !self.question.trim().is_empty()
            && self.options.len() == 4
            && unique.len() == 4
            && self.options.contains(&self.correct_answer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

impl Record for Flashcard {
    fn is_valid(&self) -> bool {
        !self.front.trim().is_empty() && !self.back.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub time: String,
    /// Minutes.
    pub duration: f64,
    pub subject: String,
    pub activity: String,
}

impl Record for ScheduleEntry {
    fn is_valid(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0 && !self.subject.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSuggestion {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Minutes.
    pub estimated_time: f64,
}

impl Record for TaskSuggestion {
    fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.estimated_time.is_finite() && self.estimated_time > 0.0
    }
}
