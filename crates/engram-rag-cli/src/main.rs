// engram-rag CLI
//
// Usage:
//   engram-rag remember "I met Alice in Paris"        store a user_input memory
//   engram-rag summary conv-1 "We planned the trip"   store a summary for a context
//   engram-rag search "Paris" -k 5                    Graph RAG search
//   engram-rag recent conv-1                          newest memories for a context
//   engram-rag related Alice --type person            graph neighborhood of an entity
//   engram-rag groom | decay | maintain | reindex | stats
//
// Output is JSON on stdout; logs go to stderr (RUST_LOG, default "info").

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engram_rag::atoms::types::{EntityType, MetadataFilter};
use engram_rag::engine::config::{default_config_path, EngineConfig};
use engram_rag::MemoryEngine;
use log::warn;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "engram-rag")]
#[command(about = "Graph-augmented memory retrieval")]
#[command(version)]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, env = "ENGRAM_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Database file, overriding the config.
    #[arg(long, global = true, env = "ENGRAM_RAG_DB")]
    db: Option<PathBuf>,

    /// Use the offline hashing embedder and skip LLM entity extraction.
    #[arg(long, global = true, env = "ENGRAM_RAG_OFFLINE")]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a memory
    Remember {
        text: String,

        /// Memory kind; "user_input" feeds the entity graph
        #[arg(long, default_value = "user_input")]
        kind: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Store a conversation summary tagged with its context id
    Summary { context_id: String, text: String },

    /// Search memories
    Search {
        query: String,

        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Plain vector search without graph expansion
        #[arg(long)]
        vector_only: bool,

        /// Restrict vector-only search to one kind
        #[arg(long, requires = "vector_only")]
        kind: Option<String>,

        /// Restrict vector-only search to "semantic" or "episodic"
        #[arg(long, requires = "vector_only")]
        memory_type: Option<String>,
    },

    /// Newest memories carrying a context tag
    Recent {
        context_id: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Entities related to a named entity
    Related {
        name: String,

        /// person | place | organization | concept
        #[arg(long = "type", default_value = "concept")]
        entity_type: String,

        #[arg(long)]
        relation: Option<String>,

        #[arg(long, default_value_t = 1)]
        depth: usize,
    },

    /// Prune light relationships and stale episodic memories
    Groom {
        #[arg(long)]
        min_weight: Option<f64>,

        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Multiply every relationship weight by a factor in [0, 1)
    Decay {
        #[arg(long)]
        factor: Option<f64>,
    },

    /// Run the scheduled job: groom, then decay
    Maintain,

    /// Index memories that were stored but never indexed
    Reindex,

    /// Counts of memories, entities, relationships and vectors
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let engine = MemoryEngine::open(config).context("failed to open memory engine")?;

    let result = run(&engine, cli.command).await;
    if let Err(e) = engine.close() {
        warn!("[cli] Checkpoint on close failed: {}", e);
    }
    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config =
        EngineConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?;
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    if cli.offline {
        config.embedding.offline = true;
    }
    Ok(config)
}

async fn run(engine: &MemoryEngine, command: Commands) -> Result<serde_json::Value> {
    let grooming = &engine.config.grooming;
    let value = match command {
        Commands::Remember { text, kind, tags } => {
            let memory = engine.lifecycle.create(&kind, &text, tags).await?;
            json!({ "id": memory.id, "kind": memory.kind, "memory_type": memory.memory_type })
        }
        Commands::Summary { context_id, text } => {
            let memory = engine.lifecycle.add_summary(&context_id, &text).await?;
            json!({ "id": memory.id, "tags": memory.tags })
        }
        Commands::Search { query, k, vector_only, kind, memory_type } => {
            let hits = if vector_only {
                let mut filter = MetadataFilter::new();
                if let Some(kind) = kind {
                    filter.insert("kind".into(), kind);
                }
                if let Some(memory_type) = memory_type {
                    filter.insert("memory_type".into(), memory_type);
                }
                let filter = (!filter.is_empty()).then_some(filter);
                engine.search.search_embeddings(&query, k, filter.as_ref()).await?
            } else {
                engine.search.search(&query, k).await?
            };
            serde_json::to_value(hits)?
        }
        Commands::Recent { context_id, limit } => {
            serde_json::to_value(engine.lifecycle.recent(&context_id, limit)?)?
        }
        Commands::Related { name, entity_type, relation, depth } => {
            let Some(ty) = EntityType::parse(&entity_type.to_lowercase()) else {
                bail!("unknown entity type '{entity_type}'");
            };
            let Some(entity) = engine.graph.find_entity(&name, ty)? else {
                bail!("no {ty} entity named '{name}'");
            };
            let ids: Vec<String> = engine
                .graph
                .get_related_entities(&entity.id, relation.as_deref(), depth)?
                .into_iter()
                .collect();
            let related: Vec<_> = engine
                .graph
                .entity_names(&ids)?
                .into_iter()
                .map(|(id, name)| json!({ "id": id, "name": name }))
                .collect();
            json!({ "entity": entity.id, "related": related })
        }
        Commands::Groom { min_weight, max_age_days } => {
            let stats = engine.lifecycle.groom_memory_graph(
                min_weight.unwrap_or(grooming.min_weight),
                max_age_days.unwrap_or(grooming.max_age_days),
            )?;
            serde_json::to_value(stats)?
        }
        Commands::Decay { factor } => {
            let touched = engine
                .lifecycle
                .decay_relationships(factor.unwrap_or(grooming.decay_factor))?;
            json!({ "relationships_decayed": touched })
        }
        Commands::Maintain => serde_json::to_value(engine.lifecycle.run_maintenance()?)?,
        Commands::Reindex => json!({ "reindexed": engine.lifecycle.reindex_missing().await? }),
        Commands::Stats => serde_json::to_value(engine.lifecycle.stats()?)?,
    };
    Ok(value)
}
