use std::fmt::Display;

use async_trait::async_trait;

use crate::error::OracleError;

/// The opaque completion oracle: prompt text in, text out.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;

    fn has_credential(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SummaryMode {
    Short,
    Long,
    Bullets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Tutor personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChatMode {
    Study,
    Coding,
    Notes,
    Doubt,
    ExamPrep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationTask {
    Summarize(SummaryMode),
    GenerateQuiz { count: u32, difficulty: Difficulty },
    GenerateFlashcards { count: u32 },
    ExplainCode { language: String },
    DebugCode { language: String, error: Option<String> },
    ConvertCode { from: String, to: String },
    AnalyzeComplexity { language: String },
    ChatTurn(ChatMode),
    GenerateSchedule { preferences: Option<String> },
    SuggestTasks { level: String },
}

impl GenerationTask {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Summarize(_) => "summarize",
            Self::GenerateQuiz { .. } => "quiz",
            Self::GenerateFlashcards { .. } => "flashcards",
            Self::ExplainCode { .. } => "explain",
            Self::DebugCode { .. } => "debug",
            Self::ConvertCode { .. } => "convert",
            Self::AnalyzeComplexity { .. } => "complexity",
            Self::ChatTurn(_) => "chat",
            Self::GenerateSchedule { .. } => "schedule",
            Self::SuggestTasks { .. } => "suggest-tasks",
        }
    }

    /// Tasks that derive their output from a body of source text.
    pub const fn reads_source_text(&self) -> bool {
        matches!(
            self,
            Self::Summarize(_) | Self::GenerateQuiz { .. } | Self::GenerateFlashcards { .. }
        )
    }

    /// Language tag of the code payload, for the code tasks.
    pub fn code_language(&self) -> Option<&str> {
        match self {
            Self::ExplainCode { language }
            | Self::DebugCode { language, .. }
            | Self::AnalyzeComplexity { language } => Some(language.as_str()),
            Self::ConvertCode { from, .. } => Some(from.as_str()),
            _ => None,
        }
    }

    /// Whether the oracle is expected to answer with a JSON array.
    pub const fn is_structured(&self) -> bool {
        matches!(
            self,
            Self::GenerateQuiz { .. }
                | Self::GenerateFlashcards { .. }
                | Self::GenerateSchedule { .. }
                | Self::SuggestTasks { .. }
        )
    }
}
