use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use workbench::detector;
use workbench::{
    ExecutionClient, HttpExecutionClient, LanguageRegistry, QuestionDetail, SessionStore, Workbench,
    WorkbenchConfig,
};

#[derive(Parser, Debug)]
#[command(name = "workbench", about = "Edit and run code snippets against a remote sandbox", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported languages in display order.
    Languages,
    /// Run code for a subject and print the classified result.
    Run(RunArgs),
    /// Print the persisted code and input for a subject.
    Show(SessionArgs),
    /// Restore starter code and clear the input for a subject.
    Reset(SessionArgs),
    /// Report whether a source file reads standard input.
    CheckInput {
        /// Source file to inspect.
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Subject (question) id the session belongs to.
    #[arg(short, long)]
    subject: String,

    /// Language name; fuzzy matched ("py", "golang", "c++").
    #[arg(short, long)]
    language: Option<String>,

    /// Question detail JSON providing per-language starter snippets.
    #[arg(long)]
    question: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Source file to run. Without it the persisted code runs.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Standard input for the program.
    #[arg(long, conflicts_with = "stdin_file")]
    stdin: Option<String>,

    /// Read standard input for the program from a file.
    #[arg(long = "stdin-file")]
    stdin_file: Option<PathBuf>,

    /// Print the classification as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("workbench=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = WorkbenchConfig::from_env()?;
    let registry = LanguageRegistry::from_config(&config)?;

    match cli.command {
        Command::Languages => {
            for language in registry.languages() {
                println!(
                    "{:<12} {} {} ({})",
                    language.display_name,
                    language.executor_id,
                    language.executor_version,
                    language.aliases.join(", ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckInput { file } => {
            let source = read_file(&file)?;
            match detector::matching_probe(&source) {
                Some(probe) => println!("reads stdin ({})", probe),
                None => println!("does not read stdin"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run(&config, registry, args).await,
        Command::Show(args) => {
            let workbench = open(&config, registry, &args).await?;
            let snapshot = workbench.snapshot();
            println!("# {} ({})", snapshot.language.display_name, workbench.subject_id());
            println!("{}", snapshot.code);
            println!("# input");
            println!("{}", snapshot.input);
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset(args) => {
            let workbench = open(&config, registry, &args).await?;
            workbench.reset().await;
            println!(
                "Reset {} for {}",
                workbench.language().display_name,
                workbench.subject_id()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(config: &WorkbenchConfig, registry: Arc<LanguageRegistry>, args: RunArgs) -> Result<ExitCode> {
    let workbench = open(config, registry, &args.session).await?;

    if let Some(file) = &args.file {
        workbench.edit_code(read_file(file)?).await;
    }
    if let Some(path) = &args.stdin_file {
        workbench.edit_input(read_file(path)?).await;
    } else if let Some(stdin) = args.stdin {
        workbench.edit_input(stdin).await;
    }

    let classification = workbench.run().await?;
    info!("Outcome: {}", classification.outcome);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
    } else {
        println!("{}", classification.transcript);
    }

    Ok(if classification.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn open(config: &WorkbenchConfig, registry: Arc<LanguageRegistry>, args: &SessionArgs) -> Result<Workbench> {
    let mut question = match &args.question {
        Some(path) => serde_json::from_str::<QuestionDetail>(&read_file(path)?)
            .with_context(|| format!("Invalid question detail: {:?}", path))?,
        None => QuestionDetail::new(args.subject.clone()),
    };
    question.id = args.subject.clone();

    let language = args
        .language
        .clone()
        .unwrap_or_else(|| registry.fallback_language().display_name.clone());

    let store = Arc::new(SessionStore::from_config(config, registry.clone()).await);
    if store.is_degraded() {
        warn!("Sessions are kept in memory only for this invocation");
    }
    let client: Arc<dyn ExecutionClient> = Arc::new(HttpExecutionClient::from_config(config)?);

    Ok(Workbench::open(&question, &language, registry, store, client).await)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}
