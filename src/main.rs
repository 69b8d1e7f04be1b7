use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use bizbot::agent::{AgentController, ConversationTurn, Persona, RunOutcome};
use bizbot::config::AppConfig;
use bizbot::eval::{default_prompts, run_matrix, write_results_csv};
use bizbot::gateway::build_gateway;
use bizbot::knowledge::load_knowledge;
use bizbot::metrics::encode_metrics;
use bizbot::tools::{tool_schemas, Sinks, ToolRegistry};
use bizbot::tracing::{init_tracing, shutdown_tracing};

/// Config file picked up from the working directory when --config is absent
const DEFAULT_CONFIG_FILE: &str = "bizbot.toml";

#[derive(Debug, Parser)]
#[command(
    name = "bizbot",
    version,
    about = "Business assistant chatbot with lead and feedback logging"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Persona to answer as (defaults to the first configured persona).
    #[arg(long, global = true)]
    persona: Option<String>,

    /// Print Prometheus metrics after the command finishes.
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session; the transcript is kept across turns.
    Chat,
    /// Answer a single message.
    Ask {
        message: String,
        /// Emit the full run outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run every prompt against every persona and write a results CSV.
    Eval {
        #[arg(long, default_value = "experiments/results.csv")]
        out: PathBuf,
    },
    /// Print the tool schemas as JSON.
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Tools = cli.command {
        let schemas: Vec<serde_json::Value> = tool_schemas()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name.as_str(),
                    "description": s.description,
                    "parameters": s.to_json_schema(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()));
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;

    init_tracing("bizbot", config.otlp_endpoint.as_deref())
        .map_err(|e| anyhow!("failed to initialize tracing: {}", e))?;

    let result = run_command(&cli, &config).await;

    if cli.print_metrics {
        println!("{}", encode_metrics());
    }
    shutdown_tracing();
    result
}

async fn run_command(cli: &Cli, config: &AppConfig) -> Result<()> {
    let knowledge = load_knowledge(&config.knowledge_paths);
    let gateway = build_gateway(config).context("building model gateway")?;
    let registry = ToolRegistry::new(Sinks::csv_in(&config.storage_dir));
    let controller = AgentController::new(gateway, registry, config.agent_config());

    match &cli.command {
        Command::Chat => {
            let persona = select_persona(config, cli.persona.as_deref(), &knowledge)?;
            chat(&controller, &persona).await
        }
        Command::Ask { message, json } => {
            let persona = select_persona(config, cli.persona.as_deref(), &knowledge)?;
            let outcome = controller.ask(&[], message, &persona).await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            Ok(())
        }
        Command::Eval { out } => {
            let personas = match cli.persona.as_deref() {
                Some(name) => vec![select_persona(config, Some(name), &knowledge)?],
                None => config.personas(&knowledge),
            };
            eval(&controller, &personas, out).await
        }
        Command::Tools => Ok(()),
    }
}

fn select_persona(config: &AppConfig, name: Option<&str>, knowledge: &str) -> Result<Persona> {
    match name {
        Some(name) => config
            .persona(name, knowledge)
            .ok_or_else(|| anyhow!("unknown persona '{}'", name)),
        None => config
            .personas(knowledge)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no personas configured")),
    }
}

async fn chat(controller: &AgentController, persona: &Persona) -> Result<()> {
    println!("💬 Chatting as {} (empty line or Ctrl+D to exit)\n", persona.name);

    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        let outcome = controller.ask(&history, message, persona).await;
        print_outcome(&outcome);
        history = outcome.transcript;
    }

    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    println!("\n{}\n", outcome.reply);
    let lines = outcome.trace.render();
    if !lines.is_empty() {
        for line in lines {
            println!("  {}", line);
        }
        println!();
    }
}

async fn eval(controller: &AgentController, personas: &[Persona], out: &Path) -> Result<()> {
    let prompts = default_prompts();
    println!(
        "🧪 Evaluating {} persona(s) x {} prompt(s)...",
        personas.len(),
        prompts.len()
    );

    let rows = run_matrix(controller, personas, &prompts).await;
    write_results_csv(out, &rows).with_context(|| format!("writing {}", out.display()))?;

    println!("┌──────────────────────┬───────────┬───────┬────────┬───────────┐");
    println!("│ Persona              │ Reply len │ Tools │ Errors │ Status    │");
    println!("├──────────────────────┼───────────┼───────┼────────┼───────────┤");
    for row in &rows {
        println!(
            "│ {:<20} │ {:>9} │ {:>5} │ {:>6} │ {:<9} │",
            truncate(&row.persona, 20),
            row.reply_len,
            row.tool_uses,
            row.errors,
            row.status
        );
    }
    println!("└──────────────────────┴───────────┴───────┴────────┴───────────┘");
    println!("✅ Results written to {}", out.display());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
