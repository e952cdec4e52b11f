use tracing::trace;

use crate::config::Limits;
use crate::context::ConversationWindow;
use crate::error::ClassifiedError;
use crate::model::{ChatMode, GenerationTask, SummaryMode};

pub const SUMMARY_PREAMBLE: &str = "You are an expert educational assistant.";
pub const SUMMARY_SHORT: &str = "Provide a concise summary (2-3 paragraphs) of the following text:";
pub const SUMMARY_LONG: &str = "Provide a detailed, comprehensive summary of the following text:";
pub const SUMMARY_BULLETS: &str =
    "Summarize the following text in bullet points, highlighting key concepts and main ideas:";

pub const QUIZ_OUTPUT_CONTRACT: &str = r#"Return ONLY a valid JSON array with this EXACT structure (no markdown code blocks, no extra text):
[
  {
    "question": "What is the main topic?",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correctAnswer": "Option A",
    "explanation": "Brief explanation of why this is correct"
  }
]

IMPORTANT:
- Return ONLY the JSON array, nothing else
- Each question must have exactly 4 options
- correctAnswer must be one of the options
- Make questions relevant to the text content"#;

pub const FLASHCARD_OUTPUT_CONTRACT: &str = r#"Return ONLY a valid JSON array with this EXACT structure (no markdown code blocks, no extra text):
[
  {
    "front": "Question or key term",
    "back": "Answer or detailed definition"
  }
]

IMPORTANT:
- Return ONLY the JSON array, nothing else
- Front should be concise (question or term)
- Back should be detailed but clear
- Focus on the most important concepts"#;

pub const SCHEDULE_OUTPUT_CONTRACT: &str = r#"Return ONLY a valid JSON array (no markdown code blocks, no extra text) with schedule items in this format:
[
  {
    "time": "09:00 AM",
    "duration": 60,
    "subject": "Subject name",
    "activity": "Activity description"
  }
]
duration is in minutes and must be greater than 0."#;

pub const TASKS_OUTPUT_CONTRACT: &str = r#"Return ONLY a valid JSON array (no markdown code blocks, no extra text):
[
  {
    "title": "Task title",
    "description": "Task description",
    "priority": "low|medium|high",
    "estimatedTime": 30
  }
]
estimatedTime is in minutes."#;

pub const STUDY_PERSONA: &str = r#"You are an expert Study Tutor. Help students understand concepts clearly with:
- Clear explanations with examples
- Breaking down complex topics
- Connecting concepts to real-world applications
- Encouraging active learning"#;
pub const CODING_PERSONA: &str = r#"You are a Code Helper. Assist students with programming:
- Explain code concepts step-by-step
- Debug issues and suggest fixes
- Provide code examples with comments
- Teach best practices"#;
pub const NOTES_PERSONA: &str = r#"You are a Notes Maker. Help create effective study materials:
- Organize information in clear sections
- Use bullet points and formatting
- Highlight key concepts
- Create concise summaries"#;
pub const DOUBT_PERSONA: &str = r#"You are a Doubt Solver. Clear student confusion by:
- Addressing specific questions directly
- Providing multiple explanations if needed
- Using analogies and examples
- Checking understanding"#;
pub const EXAM_PREP_PERSONA: &str = r#"You are an Exam Prep Coach. Help students prepare for exams:
- Create practice questions
- Explain important topics
- Provide test-taking strategies
- Build confidence through practice"#;

const fn persona(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Study => STUDY_PERSONA,
        ChatMode::Coding => CODING_PERSONA,
        ChatMode::Notes => NOTES_PERSONA,
        ChatMode::Doubt => DOUBT_PERSONA,
        ChatMode::ExamPrep => EXAM_PREP_PERSONA,
    }
}

/// A fully assembled prompt. Only [`PromptBuilder`] creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEnvelope {
    instruction: String,
    payload: String,
    task: GenerationTask,
}

impl PromptEnvelope {
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub const fn task(&self) -> &GenerationTask {
        &self.task
    }

    /// The text sent to the oracle.
    pub fn prompt_text(&self) -> String {
        match &self.task {
            GenerationTask::ChatTurn(_) => {
                format!("{}Student: {}\n\nTutor:", self.instruction, self.payload)
            }
            task => match task.code_language() {
                Some(language) => format!(
                    "{}\n\n```{language}\n{}\n```",
                    self.instruction, self.payload
                ),
                None => format!("{}\n\n{}", self.instruction, self.payload),
            },
        }
    }
}

/// Smallest acceptable payload for `task`, in chars after trimming.
pub(crate) const fn min_payload_chars(task: &GenerationTask, limits: &Limits) -> usize {
    if task.reads_source_text() {
        limits.min_input_chars
    } else {
        1
    }
}

pub(crate) fn payload_is_too_short(task: &GenerationTask, payload: &str, limits: &Limits) -> bool {
    payload.trim().chars().count() < min_payload_chars(task, limits)
}

/// Hard cut to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    limits: Limits,
}

impl PromptBuilder {
    pub const fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Builds the envelope for a non-chat task. `input` is the source text,
    /// the code, the comma separated subject list or the single subject.
    pub fn build(&self, task: GenerationTask, input: &str) -> Result<PromptEnvelope, ClassifiedError> {
        self.assemble(task, input, "")
    }

    pub fn build_chat(
        &self,
        mode: ChatMode,
        message: &str,
        window: &ConversationWindow,
    ) -> Result<PromptEnvelope, ClassifiedError> {
        self.build_chat_with_history(mode, message, &String::from(window))
    }

    /// Builds a chat envelope from an already rendered history block.
    pub fn build_chat_with_history(
        &self,
        mode: ChatMode,
        message: &str,
        history: &str,
    ) -> Result<PromptEnvelope, ClassifiedError> {
        self.assemble(GenerationTask::ChatTurn(mode), message, history)
    }

    fn assemble(
        &self,
        task: GenerationTask,
        input: &str,
        history: &str,
    ) -> Result<PromptEnvelope, ClassifiedError> {
        if payload_is_too_short(&task, input, &self.limits) {
            return Err(ClassifiedError::empty_input(input_label(&task)));
        }
        let payload = match self.budget(&task) {
            Some(budget) => truncate_chars(input, budget),
            None => input,
        }
        .to_string();
        let instruction = instruction(&task, history);
        trace!(task = task.name(), payload_chars = payload.chars().count(), "built prompt");
        Ok(PromptEnvelope {
            instruction,
            payload,
            task,
        })
    }

    const fn budget(&self, task: &GenerationTask) -> Option<usize> {
        match task {
            GenerationTask::Summarize(_) => Some(self.limits.summary_chars),
            GenerationTask::GenerateQuiz { .. } => Some(self.limits.quiz_chars),
            GenerationTask::GenerateFlashcards { .. } => Some(self.limits.flashcard_chars),
            GenerationTask::ExplainCode { .. }
            | GenerationTask::DebugCode { .. }
            | GenerationTask::ConvertCode { .. }
            | GenerationTask::AnalyzeComplexity { .. } => Some(self.limits.code_chars),
            GenerationTask::ChatTurn(_)
            | GenerationTask::GenerateSchedule { .. }
            | GenerationTask::SuggestTasks { .. } => None,
        }
    }
}

const fn input_label(task: &GenerationTask) -> &'static str {
    match task {
        GenerationTask::Summarize(_)
        | GenerationTask::GenerateQuiz { .. }
        | GenerationTask::GenerateFlashcards { .. } => "Source text",
        GenerationTask::ExplainCode { .. }
        | GenerationTask::DebugCode { .. }
        | GenerationTask::ConvertCode { .. }
        | GenerationTask::AnalyzeComplexity { .. } => "Code",
        GenerationTask::ChatTurn(_) => "Message",
        GenerationTask::GenerateSchedule { .. } => "Subject list",
        GenerationTask::SuggestTasks { .. } => "Subject",
    }
}

fn instruction(task: &GenerationTask, history: &str) -> String {
    match task {
        GenerationTask::Summarize(mode) => {
            let body = match mode {
                SummaryMode::Short => SUMMARY_SHORT,
                SummaryMode::Long => SUMMARY_LONG,
                SummaryMode::Bullets => SUMMARY_BULLETS,
            };
            format!("{SUMMARY_PREAMBLE} {body}")
        }
        GenerationTask::GenerateQuiz { count, difficulty } => format!(
            "You are an expert quiz creator. Generate {count} {difficulty} difficulty multiple-choice quiz questions based on the provided text.\n\n{QUIZ_OUTPUT_CONTRACT}\n\nText to analyze:"
        ),
        GenerationTask::GenerateFlashcards { count } => format!(
            "Create {count} educational flashcards from the given text. Each flashcard should help students learn key concepts.\n\n{FLASHCARD_OUTPUT_CONTRACT}\n\nText:"
        ),
        GenerationTask::ExplainCode { language } => format!(
            "You are an expert programming tutor. Explain the following {language} code clearly and concisely.\n\nProvide:\n1. **What it does**: Overall purpose\n2. **How it works**: Step-by-step explanation\n3. **Key concepts**: Important programming concepts used"
        ),
        GenerationTask::DebugCode { language, error } => {
            let error = error
                .as_deref()
                .filter(|error| !error.trim().is_empty())
                .map_or(String::new(), |error| format!(" that produces this error: {error}"));
            format!(
                "You are an expert debugging assistant. Debug this {language} code{error}.\n\nProvide:\n1. **Issues Found**: List all bugs, errors, or potential problems\n2. **Fixed Code**: Corrected version with fixes\n3. **Explanation**: Why each fix was necessary"
            )
        }
        GenerationTask::ConvertCode { from, to } => format!(
            "Convert this {from} code to {to}.\n\nProvide:\n1. **Converted Code**: Complete {to} version\n2. **Key Differences**: Syntax and feature differences between languages\n3. **Notes**: Any important considerations"
        ),
        GenerationTask::AnalyzeComplexity { language } => format!(
            "You are an expert in algorithm analysis. Analyze the time and space complexity of this {language} code.\n\nProvide:\n1. **Time Complexity**: Big-O notation with explanation\n2. **Space Complexity**: Big-O notation with explanation\n3. **Optimization Suggestions**: If any improvements can be made\n\nBe clear and concise."
        ),
        GenerationTask::ChatTurn(mode) => {
            let persona = persona(*mode);
            if history.is_empty() {
                format!("{persona}\n\n")
            } else {
                format!("{persona}\n\nPrevious conversation:\n{history}\n\n")
            }
        }
        GenerationTask::GenerateSchedule { preferences } => {
            let preferences = preferences
                .as_deref()
                .filter(|preferences| !preferences.trim().is_empty())
                .map_or(String::new(), |preferences| format!("\nPreferences: {preferences}\n"));
            format!(
                "Create a daily study schedule for the subjects listed below.\n{preferences}\n{SCHEDULE_OUTPUT_CONTRACT}\n\nSubjects:"
            )
        }
        GenerationTask::SuggestTasks { level } => format!(
            "Suggest 5 study tasks at {level} level for the subject below.\n\n{TASKS_OUTPUT_CONTRACT}\n\nSubject:"
        ),
    }
}
