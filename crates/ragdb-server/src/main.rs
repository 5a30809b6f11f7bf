//! RagDB: retrieval-augmented generation index manager server.

use std::path::PathBuf;
use std::sync::Arc;

use ragdb_chat::{BotConfig, Generator, OpenAiCompatGenerator};
use ragdb_core::RagConfig;
use ragdb_ingest::{load_dataset, DEFAULT_COLUMN};
use ragdb_runtime::RagManager;
use ragdb_server::{build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("RAGDB_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn open_manager(config: &RagConfig) -> anyhow::Result<Arc<RagManager>> {
    let embedder = ragdb_infer::create_embedder(&config.data_paths.models, config.embedding_dim);
    let manager = RagManager::from_config(config, embedder)
        .map_err(|e| anyhow::anyhow!("Failed to open index: {}", e))?;
    Ok(Arc::new(manager))
}

fn print_help() {
    println!("RagDB: retrieval-augmented generation index manager");
    println!();
    println!("Usage: ragdb [command]");
    println!();
    println!("Commands:");
    println!("  (none)                        Start the server");
    println!("  ingest <name> <path> [col]    Ingest a JSON/JSONL dataset export");
    println!("  stats                         Print index statistics");
    println!("  wipe                          Delete the index and dataset manifest");
    println!("  help                          Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_dir = resolve_data_dir();

    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            "ingest" => {
                if args.len() < 4 {
                    eprintln!("Usage: ragdb ingest <name> <path> [column]");
                    std::process::exit(1);
                }
                let config = RagConfig::from_env(&data_dir)?;
                let manager = open_manager(&config)?;
                let column = args.get(4).map(String::as_str).unwrap_or(DEFAULT_COLUMN);
                let loaded = load_dataset(&PathBuf::from(&args[3]), column)?;
                let report = manager
                    .ingest_in_background(args[2].clone(), loaded.size_bytes, loaded.documents)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            "stats" => {
                let config = RagConfig::from_env(&data_dir)?;
                let manager = open_manager(&config)?;
                println!("{}", serde_json::to_string_pretty(&manager.stats())?);
                println!("{}", serde_json::to_string_pretty(&manager.list_sources())?);
                return Ok(());
            }
            "wipe" => {
                let config = RagConfig::from_env(&data_dir)?;
                let manager = open_manager(&config)?;
                let report = manager.wipe()?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                std::process::exit(if report.is_clean() { 0 } else { 1 });
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ragdb help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    info!("Data directory: {}", data_dir.display());

    let config = RagConfig::from_env(&data_dir)?;
    let port = config.port;
    let manager = open_manager(&config)?;

    let bot_config = BotConfig::load(&config.data_paths.bot_config_file);
    let generator: Arc<dyn Generator> = Arc::new(OpenAiCompatGenerator::from_config(&bot_config));
    info!("Generation model: {} at {}", bot_config.llm_model(), bot_config.llm_url());

    let state = Arc::new(AppState::new(config, manager, bot_config, generator));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("RagDB server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
