use actionflow::assistant::{Assistant, AssistantOptions};
use actionflow::config::Config;
use actionflow::embedding::HashEmbedder;
use actionflow::knowledge::KnowledgeBase;
use actionflow::llm::{Llm, LlmOptions};
use actionflow::storage::{RunStorage, SqliteStorage};
use actionflow::tools::{calculator, file_tools, shell_tools};
use actionflow::utils::preview;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RUNS_TABLE: &str = "assistant_runs";

#[derive(Parser, Debug)]
#[command(name = "actionflow", version, about = "Tool-calling LLM assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat; resumes the latest run unless --new is given
    Chat(ChatArgs),
    /// Ask a single question and exit
    Ask {
        prompt: String,
        #[command(flatten)]
        opts: ChatArgs,
    },
    /// List stored runs, newest first
    Runs {
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the conversation of a stored run
    Show { run_id: String },
    /// Delete a stored run
    Delete { run_id: String },
}

#[derive(Debug, Args)]
struct ChatArgs {
    /// Resume this run
    #[arg(long)]
    run_id: Option<String>,
    /// Start a new run instead of resuming the latest one
    #[arg(long)]
    new: bool,
    #[arg(long)]
    user: Option<String>,
    /// Stream the answer as it is generated
    #[arg(long)]
    stream: bool,
    /// Maximum tool calls per run (overrides ACTIONFLOW_FUNCTION_CALL_LIMIT)
    #[arg(long)]
    limit: Option<usize>,
    /// Directory file tools are confined to
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,
    /// Enable the shell tool
    #[arg(long)]
    shell: bool,
    /// Text file or directory to load into the knowledge base
    #[arg(long)]
    knowledge: Option<PathBuf>,
    /// Print executed tool calls before the answer
    #[arg(long)]
    show_tool_calls: bool,
}

fn open_storage(config: &Config) -> Result<Arc<SqliteStorage>> {
    let storage = SqliteStorage::open(&config.db_path, RUNS_TABLE)
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
    Ok(Arc::new(storage))
}

fn build_assistant(config: &Config, storage: Arc<SqliteStorage>, args: &ChatArgs) -> Result<Assistant> {
    let backend = config.build_backend()?;
    let mut llm = Llm::new(backend)
        .with_options(LlmOptions {
            name: Some("actionflow".to_string()),
            function_call_limit: args.limit.unwrap_or(config.function_call_limit),
            show_tool_calls: args.show_tool_calls,
            ..LlmOptions::default()
        })
        .with_tool(calculator())
        .with_tool(file_tools(args.work_dir.clone()));
    if args.shell {
        llm.add_tool(shell_tools(args.work_dir.clone()));
    }

    let run_id = match (&args.run_id, args.new) {
        (Some(id), _) => Some(id.clone()),
        (None, true) => None,
        (None, false) => storage.get_all_run_ids(args.user.as_deref())?.into_iter().next(),
    };

    let mut assistant = Assistant::new(
        llm,
        AssistantOptions {
            name: Some("actionflow".to_string()),
            description: Some("You are a helpful assistant that can use tools to answer questions.".to_string()),
            add_datetime_to_instructions: true,
            markdown: true,
            user_id: args.user.clone(),
            run_id,
            ..AssistantOptions::default()
        },
    )
    .with_storage(storage);

    if let Some(path) = &args.knowledge {
        let kb = KnowledgeBase::new(HashEmbedder);
        kb.load_path(path)?;
        assistant = assistant.with_knowledge(kb);
    }
    Ok(assistant)
}

async fn chat(mut assistant: Assistant, stream: bool) -> Result<()> {
    let run_id = assistant.start()?.to_string();
    println!("\u{001b}[94mactionflow\u{001b}[0m \u{001b}[90m(run {})\u{001b}[0m", run_id);
    println!("\u{001b}[90mType 'quit' to exit, 'help' for commands.\u{001b}[0m");

    loop {
        print!("\u{001b}[93mYou:\u{001b}[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        match input.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                println!("  quit | exit   leave the chat");
                println!("  run           show the current run id");
                println!("  new           start a new run");
                continue;
            }
            "new" => {
                assistant.new_run();
                println!("\u{001b}[90m(run {})\u{001b}[0m", assistant.start()?);
                continue;
            }
            "run" => {
                println!("{}", assistant.run_id());
                continue;
            }
            text => {
                print!("\u{001b}[96mAssistant:\u{001b}[0m ");
                io::stdout().flush()?;
                if let Err(e) = assistant.print_response(text, stream).await {
                    eprintln!("\u{001b}[91mError:\u{001b}[0m {:#}", e);
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "actionflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(model = %config.model, db = %config.db_path.display(), "Loaded configuration");
    let storage = open_storage(&config)?;

    match cli.command {
        Command::Chat(args) => {
            let assistant = build_assistant(&config, storage, &args)?;
            chat(assistant, args.stream).await?;
        }
        Command::Ask { prompt, opts } => {
            let mut assistant = build_assistant(&config, storage, &opts)?;
            assistant.print_response(&prompt, opts.stream).await?;
        }
        Command::Runs { user } => {
            for run_id in storage.get_all_run_ids(user.as_deref())? {
                let Some(run) = storage.read(&run_id)? else {
                    continue;
                };
                let first = run.chat_pairs().into_iter().next().map(|(q, _)| q).unwrap_or_default();
                println!(
                    "{}  {}  {:>3} msgs  {}",
                    run.run_id,
                    run.updated_at.format("%Y-%m-%d %H:%M"),
                    run.messages.len(),
                    preview(&first, 60)
                );
            }
        }
        Command::Show { run_id } => {
            let run = storage
                .read(&run_id)?
                .with_context(|| format!("No run with id {}", run_id))?;
            for (question, answer) in run.chat_pairs() {
                println!("\u{001b}[93mYou:\u{001b}[0m {}", question);
                println!("\u{001b}[96mAssistant:\u{001b}[0m {}\n", answer);
            }
        }
        Command::Delete { run_id } => {
            storage.delete(&run_id)?;
            println!("Deleted {}", run_id);
        }
    }
    Ok(())
}
