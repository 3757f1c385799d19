use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "normeval",
    version,
    about = "Answer generation and rubric judging for fire-safety norm questions"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// path to normeval.yaml
    #[arg(long, global = true, env = "NORMEVAL_CONFIG", default_value = "normeval.yaml")]
    pub config_file: PathBuf,

    /// database path (overrides database.path from the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// fail on unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict_config: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample config, create the database and seed the catalog
    Init,
    /// Generate answers for unanswered questions
    Generate(BatchArgs),
    /// Judge generated answers with the contextual rubric
    Judge(JudgeArgs),
    /// Progress per model and configuration
    Status(StatusArgs),
    #[command(subcommand)]
    Questions(QuestionsSub),
    #[command(subcommand)]
    Models(ModelsSub),
    /// List recognized prompt configurations
    Configs,
    #[command(subcommand)]
    Annotate(AnnotateSub),
    /// Per-model and per-norm statistics
    Report(ReportArgs),
    Version,
}

#[derive(Args, Clone, Debug)]
pub struct BatchArgs {
    /// model name as registered in the catalog
    #[arg(long)]
    pub model: String,

    /// prompt configuration label (no-rag, simple-rag, agentic-rag, few-shot, chain-of-thought)
    #[arg(long = "config", default_value = "no-rag")]
    pub configuration: String,

    #[arg(long)]
    pub limit: Option<usize>,

    /// first question number to process (inclusive)
    #[arg(long)]
    pub start_from: Option<i64>,

    #[arg(long)]
    pub norm: Option<String>,

    #[arg(long)]
    pub interesting_only: bool,

    #[arg(long)]
    pub disputed_only: bool,

    /// seconds between items (defaults to the config file value)
    #[arg(long)]
    pub delay: Option<f64>,

    /// produce placeholder output without external calls or persistence
    #[arg(long)]
    pub simulate: bool,

    /// replace existing answers / judgments
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Clone, Debug)]
pub struct JudgeArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// write per-item results as JSON
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long = "config")]
    pub configuration: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum QuestionsSub {
    /// Import questions from a YAML file
    Import {
        file: PathBuf,
        /// overwrite questions whose number already exists
        #[arg(long)]
        update: bool,
    },
    List {
        #[arg(long)]
        norm: Option<String>,
    },
    /// Set or clear question flags
    Flag {
        number: i64,
        #[arg(long)]
        disputed: Option<bool>,
        #[arg(long)]
        test_set: Option<bool>,
        #[arg(long)]
        interesting: Option<bool>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ModelsSub {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum AnnotateSub {
    /// Answers without a human verdict
    Pending {
        #[arg(long)]
        model: Option<String>,
        #[arg(long = "config")]
        configuration: Option<String>,
        #[arg(long)]
        norm: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record a human verdict for one answer
    Mark {
        answer_id: i64,
        #[arg(long, conflicts_with = "incorrect", required_unless_present = "incorrect")]
        correct: bool,
        #[arg(long)]
        incorrect: bool,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ReportArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// restrict statistics to one configuration
    #[arg(long = "config")]
    pub configuration: Option<String>,
}
