mod doctor;
mod logging;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use nodeweave_agent::graph::{Direction, TraceEntry};
use nodeweave_agent::workflows::chat::{run_chat, ChatDependencies, ChatState};
use nodeweave_agent::workflows::hello::{run_hello, HelloDependencies, HelloState};
use nodeweave_agent::workflows::ingest::{
    ingest_documents, ingest_files, IngestDependencies, IngestState,
};
use nodeweave_agent::workflows::rag::{run_rag, RagDependencies, RagState};
use nodeweave_agent::workflows::{render_mermaid, WORKFLOW_NAMES};
use nodeweave_core::config::{AppConfig, ModelConfig};
use nodeweave_memory::{load_documents_from_directory, SqliteDocumentStore};

#[derive(Parser)]
#[command(name = "nodeweave", version, about = "Typed node-graph workflows for LLM pipelines")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "nodeweave.toml")]
    config: PathBuf,

    /// Print the final workflow state as JSON after the run
    #[arg(long, global = true)]
    state: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the four-step Hello World workflow
    Hello {
        /// Use the prefixing client with this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Preset greeting; HelloNode keeps it instead of generating one
        #[arg(long)]
        hello: Option<String>,
        /// Preset noun; WorldNode keeps it instead of generating one
        #[arg(long)]
        world: Option<String>,
        /// Skip the artificial per-node delays
        #[arg(long)]
        no_latency: bool,
    },
    /// Send one prompt to the configured model
    Chat {
        /// The prompt (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Route, extract and store files or directories
    Ingest {
        /// Files or directories (directories are expanded one level)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Target collection (defaults to [store].default_collection)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Load every text file in a directory and store it directly
    Load {
        /// Directory to load
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        /// Target collection (defaults to [store].default_collection)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Answer a question from stored documents
    Rag {
        /// The question to ask
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
        /// Collection to search (defaults to [store].default_collection)
        #[arg(long)]
        collection: Option<String>,
        /// Number of documents to retrieve (defaults to [rag].n_results)
        #[arg(long)]
        n_results: Option<usize>,
    },
    /// Print a workflow as a Mermaid state diagram
    Graph {
        /// Workflow name (hello, chat, ingest, rag)
        workflow: String,
        /// Layout direction: TB, LR, RL or BT
        #[arg(long, default_value = "TB")]
        direction: Direction,
    },
    /// List stored collections and their document counts
    Collections,
    /// Show current configuration
    Config,
    /// Run configuration and store health checks
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        create_env_config()
    };

    let _log_guard = logging::init(&config.log)?;
    if !cli.config.exists() {
        warn!(
            path = %cli.config.display(),
            provider = %config.model.provider,
            "No config file found, using environment defaults"
        );
    }

    match cli.command {
        None => {
            let deps = HelloDependencies::new();
            hello(HelloState::default(), deps, cli.state).await?;
        }
        Some(Commands::Hello {
            prefix,
            hello: preset_hello,
            world,
            no_latency,
        }) => {
            let mut deps = match prefix {
                Some(p) => HelloDependencies::custom(Some(p)),
                None => HelloDependencies::new(),
            };
            if no_latency {
                deps = deps.without_latency();
            }
            let mut state = HelloState::default();
            if let Some(h) = preset_hello {
                state.hello_text = h;
            }
            if let Some(w) = world {
                state.world_text = w;
            }
            hello(state, deps, cli.state).await?;
        }
        Some(Commands::Chat { prompt }) => {
            let text = if prompt.is_empty() {
                io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                prompt.join(" ")
            };
            let deps = ChatDependencies::from_config(&config)?;
            let mut state = ChatState::new(text);
            let run = run_chat(&mut state, &deps).await?;

            println!("{}", run.output);
            println!();
            println!("Generation time: {:.3}s", state.ai_generation_time);
            print_run(&state.node_execution_history, &run.trace);
            print_state(cli.state, &state)?;
        }
        Some(Commands::Ingest { paths, collection }) => {
            let deps = IngestDependencies::open(&config)?;
            let mut state = IngestState::from_paths(&paths, collection.unwrap_or_default());
            let run = ingest_files(&mut state, &deps).await?;
            let result = run.output;

            println!("\nDocument Ingestion Results:");
            println!("- Collection: {}", result.collection);
            println!("- Stored: {}", result.count);
            println!(
                "- Routed: {} heavy, {} direct, {} skipped, {} unreadable",
                state.routing.heavy.len(),
                state.routing.direct.len(),
                state.routing.skipped.len(),
                state.routing.unreadable.len()
            );
            if let Some(ref e) = result.error {
                println!("- Error: {}", e);
            }
            for path in &state.failed_files {
                println!("- Failed: {}", path.display());
            }
            println!(
                "- Time: routing {:.3}s, processing {:.3}s, ingestion {:.3}s",
                state.routing_time, state.processing_time, state.ingestion_time
            );
            if !result.ids.is_empty() {
                println!("\nIngested Documents:");
                for (i, id) in result.ids.iter().enumerate() {
                    println!("  {}. {}", i + 1, id);
                }
            }
            print_run(&state.node_execution_history, &run.trace);
            print_state(cli.state, &state)?;
        }
        Some(Commands::Load {
            data_dir,
            collection,
        }) => {
            let loaded = load_documents_from_directory(&data_dir);
            if loaded.is_empty() {
                println!("No documents found in {}", data_dir.display());
                return Ok(());
            }
            info!(count = loaded.len(), dir = %data_dir.display(), "Loaded documents");

            let deps = IngestDependencies::open(&config)?;
            let mut state = IngestState::from_loaded(loaded, collection.unwrap_or_default());
            let run = ingest_documents(&mut state, &deps).await?;

            println!("\nDocument Ingestion Results:");
            println!("- Collection: {}", run.output.collection);
            println!("- Documents: {}", state.documents.len());
            println!("- Store: {}", display_abs(&config.store_path()));
            println!("- Ingestion Time: {:.3} seconds", state.total_time);
            println!("\nIngested Documents:");
            for (i, (id, meta)) in state.document_ids.iter().zip(&state.metadata).enumerate() {
                let filename = meta.get("filename").and_then(|v| v.as_str()).unwrap_or("?");
                let size = meta.get("file_size").and_then(|v| v.as_u64()).unwrap_or(0);
                println!("  {}. {} - {} ({} bytes)", i + 1, id, filename, size);
            }
            print_run(&state.node_execution_history, &run.trace);
            print_state(cli.state, &state)?;
        }
        Some(Commands::Rag {
            query,
            collection,
            n_results,
        }) => {
            let collection = collection.unwrap_or_else(|| config.store.default_collection.clone());
            let store = SqliteDocumentStore::open(&config.store_path())?;
            if store.count(&collection)? == 0 {
                anyhow::bail!(
                    "collection '{}' is empty or missing; ingest documents first",
                    collection
                );
            }

            let llm = nodeweave_llm::create_client_with_fallbacks(
                &config.model,
                &config.fallback_models,
            )?;
            let deps = RagDependencies::new(Arc::from(llm), Arc::new(store))
                .with_collection(collection)
                .with_n_results(n_results.unwrap_or(config.rag.n_results));
            let mut state = RagState::new(query.join(" "));
            let run = run_rag(&mut state, &deps).await?;

            println!("\nRAG Query Results:");
            println!("{}", "=".repeat(80));
            println!("{}", run.output);
            println!("{}", "=".repeat(80));
            println!("Retrieval time: {:.2}s", state.retrieval_time);
            println!("Generation time: {:.2}s", state.generation_time);
            println!("Total execution time: {:.2}s", state.total_time);
            print_run(&state.node_execution_history, &run.trace);
            print_state(cli.state, &state)?;
        }
        Some(Commands::Graph {
            workflow,
            direction,
        }) => match render_mermaid(&workflow, direction) {
            Some(diagram) => println!("{}", diagram),
            None => anyhow::bail!(
                "unknown workflow '{}' (expected one of: {})",
                workflow,
                WORKFLOW_NAMES.join(", ")
            ),
        },
        Some(Commands::Collections) => {
            let store = SqliteDocumentStore::open(&config.store_path())?;
            let collections = store.collections()?;
            if collections.is_empty() {
                println!("No collections in {}", config.store_path().display());
            }
            for name in collections {
                println!("{}\t{}", name, store.count(&name)?);
            }
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Doctor) => {
            println!("nodeweave doctor");
            println!();
            if doctor::run_doctor(&config) > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn hello(
    mut state: HelloState,
    deps: HelloDependencies,
    show_state: bool,
) -> anyhow::Result<()> {
    let run = run_hello(&mut state, &deps).await?;
    println!("{}", run.output);
    println!();
    println!("Total time: {:.3}s", state.total_time);
    print_run(&state.execution_history, &run.trace);
    print_state(show_state, &state)
}

fn print_run(history: &[String], trace: &[TraceEntry]) {
    println!("\nExecution history:");
    for line in history {
        println!("  {}", line);
    }
    let path: Vec<String> = trace.iter().map(ToString::to_string).collect();
    println!("Trace: {}", path.join(" -> "));
}

fn print_state<T: Serialize>(enabled: bool, state: &T) -> anyhow::Result<()> {
    if enabled {
        println!("\nFinal state:");
        println!("{}", serde_json::to_string_pretty(state)?);
    }
    Ok(())
}

fn display_abs(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Minimal config when no file exists: pick a provider from the environment,
/// falling back to the offline mock client.
fn create_env_config() -> AppConfig {
    let gemini_key = std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    let model = if let Some(key) = gemini_key {
        ModelConfig {
            api_key: Some(key),
            ..ModelConfig::default()
        }
    } else if let Some(key) = openai_key {
        ModelConfig {
            provider: "openai".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            api_key: Some(key),
            ..ModelConfig::default()
        }
    } else {
        ModelConfig {
            provider: "mock".to_string(),
            model_id: "mock".to_string(),
            ..ModelConfig::default()
        }
    };

    AppConfig {
        model,
        ..AppConfig::default()
    }
}
