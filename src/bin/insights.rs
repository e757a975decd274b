#![forbid(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use insights_desk::{describe_schema, logging, AgentConfig, QueryAgent};

const GREETING: &str = "Hello! I can help you query the database. What would you like to know?";

#[derive(Parser)]
#[command(
    name = "insights",
    version,
    about = "Answer questions from a database or the web"
)]
struct Cli {
    /// Chat model id (overrides INSIGHTS_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,
    /// SQLite database file (overrides INSIGHTS_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Database backend (overrides INSIGHTS_DB_BACKEND)
    #[arg(long, value_enum, global = true)]
    backend: Option<Backend>,
    /// Also append logs to query_log_YYYYMMDD.log in this directory
    #[arg(long, env = "INSIGHTS_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Sqlite,
    Postgres,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        question: String,
    },
    /// Print the schema description the models see
    Schema,
    /// Interactive question loop on stdin
    Chat,
}

impl Cli {
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(model) = &self.model {
            out.push(("INSIGHTS_MODEL", model.clone()));
        }
        if let Some(db) = &self.db {
            out.push(("INSIGHTS_DB_PATH", db.display().to_string()));
        }
        match self.backend {
            Some(Backend::Sqlite) => out.push(("INSIGHTS_DB_BACKEND", "sqlite".into())),
            Some(Backend::Postgres) => out.push(("INSIGHTS_DB_BACKEND", "postgres".into())),
            None => {}
        }
        out
    }

    fn config(&self) -> Result<AgentConfig, insights_desk::ConfigError> {
        let overrides = self.overrides();
        AgentConfig::from_lookup(|key| {
            overrides
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| std::env::var(key).ok())
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_dir.as_deref())?;
    let config = cli.config()?;

    match cli.command {
        Commands::Ask { question } => {
            let agent = config.build_agent()?;
            let answer = agent.process_question(&question).await?;
            println!("{answer}");
        }
        Commands::Schema => {
            let db = config.database.connect()?;
            let schema = describe_schema(db.as_ref()).await?;
            println!("{schema}");
        }
        Commands::Chat => {
            let agent = config.build_agent()?;
            chat_loop(&agent).await?;
        }
    }

    Ok(())
}

async fn chat_loop(agent: &QueryAgent) -> Result<(), Box<dyn std::error::Error>> {
    println!("{GREETING}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match agent.process_question(question).await {
            Ok(answer) => println!("{answer}"),
            Err(e) => println!("Error processing query: {e}"),
        }
    }

    Ok(())
}
