use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::config::Config;
use crate::gemini::GeminiOracle;
use crate::model::{ChatMode, Difficulty, Oracle, SummaryMode};
use crate::StudyAssistant;

#[derive(Parser, Clone)]
#[command(name = "studygen", author, version, about, long_about = None)]
pub struct StudyGenCLIArgs {
    /// YAML config file; unset keys use the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured model name.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: StudyGenCommand,
}

#[derive(Subcommand, Clone)]
pub enum StudyGenCommand {
    Summarize(SummarizeArgs),
    Quiz(QuizArgs),
    Flashcards(FlashcardArgs),
    Explain(CodeArgs),
    Debug(DebugArgs),
    Convert(ConvertArgs),
    Complexity(CodeArgs),
    Chat(ChatArgs),
    Schedule(ScheduleArgs),
    SuggestTasks(SuggestTasksArgs),
}

#[derive(clap::Args, Clone)]
pub struct InputArgs {
    /// Read input from this file instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,
}

impl InputArgs {
    fn read(&self) -> io::Result<String> {
        match &self.input {
            Some(path) => fs::read_to_string(path),
            None => {
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ArgSummaryMode {
    Short,
    Long,
    Bullets,
    All,
}

#[derive(clap::Args, Clone)]
pub struct SummarizeArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long, value_enum, default_value = "all")]
    mode: ArgSummaryMode,
}

#[derive(clap::Args, Clone)]
pub struct QuizArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long, default_value_t = 10)]
    count: u32,

    #[arg(long, value_enum, default_value = "medium")]
    difficulty: Difficulty,
}

#[derive(clap::Args, Clone)]
pub struct FlashcardArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long, default_value_t = 10)]
    count: u32,
}

#[derive(clap::Args, Clone)]
pub struct CodeArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long)]
    language: String,
}

#[derive(clap::Args, Clone)]
pub struct DebugArgs {
    #[command(flatten)]
    code: CodeArgs,

    /// Error message the code produces.
    #[arg(long)]
    error: Option<String>,

    /// Write the fixed code blocks of the response to this file.
    #[arg(long)]
    edit_file: Option<PathBuf>,
}

#[derive(clap::Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long)]
    from: String,

    #[arg(long)]
    to: String,

    /// Write the converted code blocks of the response to this file.
    #[arg(long)]
    edit_file: Option<PathBuf>,
}

#[derive(clap::Args, Clone)]
pub struct ChatArgs {
    #[arg(long, value_enum, default_value = "study")]
    mode: ChatMode,
}

#[derive(clap::Args, Clone)]
pub struct ScheduleArgs {
    #[arg(long = "subject", required = true)]
    subjects: Vec<String>,

    #[arg(long)]
    preferences: Option<String>,
}

#[derive(clap::Args, Clone)]
pub struct SuggestTasksArgs {
    #[arg(long)]
    subject: String,

    #[arg(long, default_value = "intermediate")]
    level: String,
}

fn load_config(args: &StudyGenCLIArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    Ok(config)
}

#[allow(clippy::missing_errors_doc)]
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = StudyGenCLIArgs::parse();
    let config = load_config(&args)?;
    let assistant = StudyAssistant::new(GeminiOracle::new(&config)?, &config);

    match args.command {
        StudyGenCommand::Summarize(args) => {
            let text = args.input.read()?;
            let mode = match args.mode {
                ArgSummaryMode::Short => SummaryMode::Short,
                ArgSummaryMode::Long => SummaryMode::Long,
                ArgSummaryMode::Bullets => SummaryMode::Bullets,
                ArgSummaryMode::All => {
                    let summaries = assistant.summarize_all(&text).await?;
                    println!("## Short\n\n{}\n", summaries.short);
                    println!("## Detailed\n\n{}\n", summaries.long);
                    println!("## Key points\n\n{}", summaries.bullets);
                    return Ok(());
                }
            };
            println!("{}", assistant.summarize(&text, mode).await?);
        }
        StudyGenCommand::Quiz(args) => {
            let text = args.input.read()?;
            print_json(&assistant.generate_quiz(&text, args.count, args.difficulty).await?)?;
        }
        StudyGenCommand::Flashcards(args) => {
            let text = args.input.read()?;
            print_json(&assistant.generate_flashcards(&text, args.count).await?)?;
        }
        StudyGenCommand::Explain(args) => {
            let code = args.input.read()?;
            println!("{}", assistant.explain_code(&code, &args.language).await?);
        }
        StudyGenCommand::Debug(args) => {
            let code = args.code.input.read()?;
            let response = assistant
                .debug_code(&code, &args.code.language, args.error.as_deref())
                .await?;
            write_response(&response, args.edit_file.as_ref())?;
        }
        StudyGenCommand::Convert(args) => {
            let code = args.input.read()?;
            let response = assistant.convert_code(&code, &args.from, &args.to).await?;
            write_response(&response, args.edit_file.as_ref())?;
        }
        StudyGenCommand::Complexity(args) => {
            let code = args.input.read()?;
            println!("{}", assistant.analyze_complexity(&code, &args.language).await?);
        }
        StudyGenCommand::Chat(args) => chat_loop(&assistant, args.mode).await?,
        StudyGenCommand::Schedule(args) => {
            print_json(
                &assistant
                    .generate_schedule(&args.subjects, args.preferences.as_deref())
                    .await?,
            )?;
        }
        StudyGenCommand::SuggestTasks(args) => {
            print_json(&assistant.suggest_tasks(&args.subject, &args.level).await?)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(records: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

fn write_response(response: &str, edit_file: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{response}");
    if let Some(file) = edit_file {
        let code_blocks = extract_code_blocks(response);
        if code_blocks.is_empty() {
            fs::write(file, response)?;
        } else {
            fs::write(file, code_blocks.join("\n"))?;
        }
    }
    Ok(())
}

const CHAT_HELP: &str = "Type a question. /regen retries the last reply, /quit exits.";

async fn chat_loop<O: Oracle>(
    assistant: &StudyAssistant<O>,
    mode: ChatMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut window = assistant.new_conversation();
    println!("{CHAT_HELP}");
    prompt_marker()?;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let message = line.trim();
        match message {
            "" => (),
            "/quit" => break,
            "/regen" => match window.last_user_index() {
                Some(user_index) => match assistant.regenerate(&window, mode, user_index).await {
                    Ok(reply) => {
                        println!("Tutor: {reply}");
                        window.accept_regenerated(user_index, reply);
                    }
                    Err(err) => eprintln!("{err}"),
                },
                None => eprintln!("Nothing to regenerate yet."),
            },
            message => match assistant.chat(&window, mode, message).await {
                Ok(reply) => {
                    println!("Tutor: {reply}");
                    window.record_exchange(message, reply);
                }
                Err(err) => eprintln!("{err}"),
            },
        }
        prompt_marker()?;
    }
    Ok(())
}

fn prompt_marker() -> io::Result<()> {
    print!("Student: ");
    io::stdout().flush()
}

fn extract_code_blocks(text: &str) -> Vec<String> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"(?s)```(?:[\w+#-]+)?\n(.*?)\n```")
            .expect("The regex expression should be valid");
    }

    RE.captures_iter(text)
        .filter_map(|capture| capture.get(1))
        .map(|code_block| code_block.as_str().to_string())
        .collect()
}
