use clap::{Parser, Subcommand};
use eoka_actor::{Affordance, IntentCatalog, ToolKit, ToolLogSink, ToolName, TracingSink};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use eoka_assist::Config;

#[derive(Parser)]
#[command(name = "eoka-assist")]
#[command(about = "Resolve user requests to page actions, standalone or as an MCP server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tools over MCP on stdio
    Serve {
        /// Config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run in headless mode (overrides config)
        #[arg(long)]
        headless: bool,
    },

    /// Resolve a request offline and print the JSON result
    Resolve {
        /// The user request
        request: String,

        /// Restrict structured matching to one category
        #[arg(long)]
        category: Option<String>,

        /// Saved affordance list (JSON array) to match the target against
        #[arg(long)]
        affordances: Option<PathBuf>,

        /// Intent catalog (defaults to the builtin one)
        #[arg(long)]
        intents: Option<PathBuf>,
    },

    /// Validate an intent catalog
    CheckIntents {
        /// Catalog YAML file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    // stdout carries the MCP transport and JSON results
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    match cli.command {
        Command::Serve { config, headless } => {
            let mut config = match config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            if headless {
                config.browser.headless = true;
            }
            eoka_assist::mcp::run_server(config).await
        }
        Command::Resolve {
            request,
            category,
            affordances,
            intents,
        } => {
            let catalog = match intents {
                Some(path) => IntentCatalog::load(path)?,
                None => IntentCatalog::builtin()?,
            };
            let affordances: Option<Vec<Affordance>> = match affordances {
                Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
                None => None,
            };
            let out = resolve(catalog, &request, category, affordances)?;
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Command::CheckIntents { file } => {
            let catalog = IntentCatalog::load(&file)?;
            println!("Catalog valid: {}", file.display());
            println!("  Intents: {}", catalog.len());
            for category in &catalog.categories {
                println!("  {}:", category.name);
                for intent in &category.intents {
                    let required = intent.fields.iter().filter(|f| f.required).count();
                    println!(
                        "    - {} ({} fields, {} required, {} actions)",
                        intent.name,
                        intent.fields.len(),
                        required,
                        intent.actions.len()
                    );
                }
            }
            Ok(())
        }
    }
}

/// Run `resolve_intent`, then `match_selector` on its target when
/// affordances were given.
fn resolve(
    catalog: IntentCatalog,
    request: &str,
    category: Option<String>,
    affordances: Option<Vec<Affordance>>,
) -> anyhow::Result<Value> {
    let sink = Arc::new(TracingSink::new());
    sink.connect()?;
    let tools = ToolKit::new(catalog, sink.clone());

    let resolved = tools.call(
        ToolName::ResolveIntent,
        json!({ "userRequest": request, "category": category }),
    );

    let target = resolved["target"].as_str().map(str::to_string);
    let natural = resolved["intentType"] == "natural_language";
    let out = match (affordances, target) {
        (Some(list), Some(target)) if natural => {
            let matched = tools.call(
                ToolName::MatchSelector,
                json!({
                    "intent": target,
                    "action": resolved["action"],
                    "text": resolved.get("text"),
                    "affordancesContext": list,
                }),
            );
            json!({ "intent": resolved, "match": matched })
        }
        _ => json!({ "intent": resolved }),
    };
    sink.close();
    Ok(out)
}
