#![allow(clippy::future_not_send)]

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod model;
pub mod normalize;
pub mod prompts;
pub mod records;

#[cfg(test)]
mod test_helpers;

use config::Config;
use context::{ConversationWindow, Role};
use error::{ClassifiedError, ErrorKind};
use gateway::ModelGateway;
use model::{ChatMode, Difficulty, GenerationTask, Oracle, SummaryMode};
use prompts::{PromptBuilder, PromptEnvelope};
use records::{Flashcard, QuizItem, Record, ScheduleEntry, TaskSuggestion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summaries {
    pub short: String,
    pub long: String,
    pub bullets: String,
}

/// Task flows: prompt building, the gateway call and, for structured tasks,
/// normalization. Every failure comes back classified.
pub struct StudyAssistant<O> {
    builder: PromptBuilder,
    gateway: ModelGateway<O>,
}

impl<O: Oracle> StudyAssistant<O> {
    pub fn new(oracle: O, config: &Config) -> Self {
        Self {
            builder: PromptBuilder::new(config.limits.clone()),
            gateway: ModelGateway::new(oracle, config.limits.clone()),
        }
    }

    /// A conversation window sized from this assistant's limits.
    pub fn new_conversation(&self) -> ConversationWindow {
        ConversationWindow::new(self.builder.limits().render_window)
    }

    async fn text(&self, envelope: PromptEnvelope) -> Result<String, ClassifiedError> {
        Ok(self.gateway.complete(&envelope).await?.raw_text)
    }

    async fn structured<T: Record>(&self, envelope: PromptEnvelope) -> Result<Vec<T>, ClassifiedError> {
        let completion = self.gateway.complete(&envelope).await?;
        Ok(normalize::normalize(&completion.raw_text)?)
    }

    pub async fn summarize(&self, text: &str, mode: SummaryMode) -> Result<String, ClassifiedError> {
        self.text(self.builder.build(GenerationTask::Summarize(mode), text)?)
            .await
    }

    /// Requests the three summary variants concurrently.
    pub async fn summarize_all(&self, text: &str) -> Result<Summaries, ClassifiedError> {
        let (short, long, bullets) = futures::try_join!(
            self.summarize(text, SummaryMode::Short),
            self.summarize(text, SummaryMode::Long),
            self.summarize(text, SummaryMode::Bullets),
        )?;
        Ok(Summaries {
            short,
            long,
            bullets,
        })
    }

    pub async fn generate_quiz(
        &self,
        text: &str,
        count: u32,
        difficulty: Difficulty,
    ) -> Result<Vec<QuizItem>, ClassifiedError> {
        let task = GenerationTask::GenerateQuiz { count, difficulty };
        self.structured(self.builder.build(task, text)?).await
    }

    pub async fn generate_flashcards(&self, text: &str, count: u32) -> Result<Vec<Flashcard>, ClassifiedError> {
        let task = GenerationTask::GenerateFlashcards { count };
        self.structured(self.builder.build(task, text)?).await
    }

    pub async fn explain_code(&self, code: &str, language: &str) -> Result<String, ClassifiedError> {
        let task = GenerationTask::ExplainCode {
            language: language.to_string(),
        };
        self.text(self.builder.build(task, code)?).await
    }

    pub async fn debug_code(
        &self,
        code: &str,
        language: &str,
        error: Option<&str>,
    ) -> Result<String, ClassifiedError> {
        let task = GenerationTask::DebugCode {
            language: language.to_string(),
            error: error.map(ToString::to_string),
        };
        self.text(self.builder.build(task, code)?).await
    }

    pub async fn convert_code(&self, code: &str, from: &str, to: &str) -> Result<String, ClassifiedError> {
        let task = GenerationTask::ConvertCode {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.text(self.builder.build(task, code)?).await
    }

    pub async fn analyze_complexity(&self, code: &str, language: &str) -> Result<String, ClassifiedError> {
        let task = GenerationTask::AnalyzeComplexity {
            language: language.to_string(),
        };
        self.text(self.builder.build(task, code)?).await
    }

    /// One tutor turn. The window is not touched; on success the caller records
    /// the exchange with [`ConversationWindow::record_exchange`].
    pub async fn chat(
        &self,
        window: &ConversationWindow,
        mode: ChatMode,
        message: &str,
    ) -> Result<String, ClassifiedError> {
        self.text(self.builder.build_chat(mode, message, window)?)
            .await
    }

    /// Produces a new reply to the user turn at `user_index`, using only the
    /// context before it. Accept it with [`ConversationWindow::accept_regenerated`].
    pub async fn regenerate(
        &self,
        window: &ConversationWindow,
        mode: ChatMode,
        user_index: usize,
    ) -> Result<String, ClassifiedError> {
        let turn = window
            .history()
            .get(user_index)
            .filter(|turn| turn.role == Role::User)
            .ok_or_else(|| {
                ClassifiedError::new(ErrorKind::EmptyInput, "There is no question to regenerate a reply for.")
            })?;
        let history = window.render_before(user_index);
        self.text(self.builder.build_chat_with_history(mode, &turn.content, &history)?)
            .await
    }

    pub async fn generate_schedule(
        &self,
        subjects: &[String],
        preferences: Option<&str>,
    ) -> Result<Vec<ScheduleEntry>, ClassifiedError> {
        let subjects: Vec<&str> = subjects
            .iter()
            .map(|subject| subject.trim())
            .filter(|subject| !subject.is_empty())
            .collect();
        let task = GenerationTask::GenerateSchedule {
            preferences: preferences.map(ToString::to_string),
        };
        self.structured(self.builder.build(task, &subjects.join(", "))?)
            .await
    }

    pub async fn suggest_tasks(&self, subject: &str, level: &str) -> Result<Vec<TaskSuggestion>, ClassifiedError> {
        let task = GenerationTask::SuggestTasks {
            level: level.to_string(),
        };
        self.structured(self.builder.build(task, subject)?).await
    }

    pub fn oracle(&self) -> &O {
        self.gateway.oracle()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::context::ConversationTurn;
    use crate::error::{ErrorKind, OracleError};
    use crate::model::{ChatMode, Difficulty, SummaryMode};
    use crate::records::Priority;
    use crate::test_helpers::ScriptedOracle;
    use crate::StudyAssistant;

    const SOURCE: &str = "The French Revolution began in 1789 and reshaped European politics.";

    fn assistant(oracle: ScriptedOracle) -> StudyAssistant<ScriptedOracle> {
        StudyAssistant::new(oracle, &Config::default())
    }

    #[tokio::test]
    async fn short_text_never_reaches_the_oracle() {
        let assistant = assistant(ScriptedOracle::texts(&["unused summary text"]));
        let err = assistant.summarize("short", SummaryMode::Short).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyInput);
        assert_eq!(assistant.oracle().call_count(), 0);
    }

    #[tokio::test]
    async fn summarize_all_collects_three_variants() {
        let assistant = assistant(ScriptedOracle::texts(&[
            "short summary text",
            "long summary text",
            "- bullet summary",
        ]));
        let summaries = assistant.summarize_all(SOURCE).await.unwrap();
        assert_eq!(summaries.short, "short summary text");
        assert_eq!(summaries.long, "long summary text");
        assert_eq!(summaries.bullets, "- bullet summary");
        assert_eq!(assistant.oracle().call_count(), 3);
    }

    #[tokio::test]
    async fn summarize_all_surfaces_a_failure() {
        let assistant = assistant(ScriptedOracle::new(vec![
            Ok("short summary text".to_string()),
            Err(OracleError::new(Some(403), "denied")),
            Ok("- bullet summary".to_string()),
        ]));
        let err = assistant.summarize_all(SOURCE).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn quiz_from_chatty_output() {
        let raw = "Here you go!\n```json\n[\n  {\"question\": \"When did it begin?\", \"options\": [\"1789\", \"1815\", \"1848\", \"1914\"], \"correctAnswer\": \"1789\", \"explanation\": \"Storming of the Bastille.\"},\n]\n```";
        let assistant = assistant(ScriptedOracle::texts(&[raw]));
        let quiz = assistant
            .generate_quiz(SOURCE, 1, Difficulty::Easy)
            .await
            .unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].correct_answer, "1789");
    }

    #[tokio::test]
    async fn prose_instead_of_flashcards_is_malformed() {
        let assistant = assistant(ScriptedOracle::texts(&[
            "I am sorry, I cannot create flashcards from this.",
        ]));
        let err = assistant.generate_flashcards(SOURCE, 5).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[tokio::test]
    async fn schedule_and_suggestions() {
        let assistant = assistant(ScriptedOracle::texts(&[
            r#"[{"time":"09:00 AM","duration":60,"subject":"Math","activity":"Practice problems"}]"#,
            r#"[{"title":"Read chapter 1","description":"Skim and take notes","priority":"high","estimatedTime":30}]"#,
        ]));
        let schedule = assistant
            .generate_schedule(&["Math".to_string(), " ".to_string()], Some("mornings"))
            .await
            .unwrap();
        assert_eq!(schedule[0].duration, 60.0);
        let prompt = &assistant.oracle().prompts()[0];
        assert!(prompt.contains("Preferences: mornings"));
        assert!(prompt.ends_with("Subjects:\n\nMath"));

        let tasks = assistant.suggest_tasks("Chemistry", "beginner").await.unwrap();
        assert_eq!(tasks[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn empty_subject_list_is_empty_input() {
        let assistant = assistant(ScriptedOracle::texts(&[]));
        let err = assistant.generate_schedule(&[], None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyInput);
    }

    #[tokio::test]
    async fn failed_chat_turn_leaves_history_alone() {
        let assistant = assistant(ScriptedOracle::new(vec![
            Ok("Osmosis is water diffusion.".to_string()),
            Err(OracleError::new(None, "socket closed")),
        ]));
        let mut window = assistant.new_conversation();

        let reply = assistant
            .chat(&window, ChatMode::Study, "What is osmosis?")
            .await
            .unwrap();
        window.record_exchange("What is osmosis?", reply);

        let err = assistant
            .chat(&window, ChatMode::Study, "And diffusion?")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "socket closed");
        assert_eq!(window.history().len(), 2);

        let prompt = &assistant.oracle().prompts()[1];
        assert!(prompt.contains("Previous conversation:\nStudent: What is osmosis?\nTutor: Osmosis is water diffusion."));
    }

    #[tokio::test]
    async fn regenerate_uses_context_before_the_question() {
        let assistant = assistant(ScriptedOracle::texts(&["A fresh, better answer."]));
        let mut window = assistant.new_conversation();
        window.record_exchange("first question", "first answer");
        window.record_exchange("second question", "weak answer");

        let user_index = window.last_user_index().unwrap();
        let reply = assistant
            .regenerate(&window, ChatMode::Doubt, user_index)
            .await
            .unwrap();
        assert_eq!(window.history().len(), 4);
        assert!(window.accept_regenerated(user_index, reply));
        assert_eq!(
            window.history()[3],
            ConversationTurn::assistant("A fresh, better answer.")
        );

        let prompt = &assistant.oracle().prompts()[0];
        assert!(prompt.contains("Student: first question\nTutor: first answer\n\nStudent: second question\n\nTutor:"));
        assert!(!prompt.contains("weak answer"));
    }
}
