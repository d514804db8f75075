//! Service wiring.
//!
//! [`Services::start`] builds every collaborator once from the config and
//! the result is shared behind an `Arc` by the HTTP handlers and CLI
//! commands. Nothing here is global.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use campus_assistant_core::chat::ChatService;
use campus_assistant_core::index::memory::InMemoryIndex;
use campus_assistant_core::index::VectorIndex;
use campus_assistant_core::indexer::Indexer;
use campus_assistant_core::intent::IntentHandler;
use campus_assistant_core::retrieval::Retriever;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::images::FsImageStore;
use crate::llm::create_model;
use crate::migrate::run_migrations;
use crate::sqlite_index::SqliteIndex;

pub struct Services {
    pub config: Config,
    pub chat: ChatService,
    pub indexer: Indexer,
    pub images: Arc<FsImageStore>,
    pool: SqlitePool,
}

impl Services {
    /// Connect to the database, run migrations and construct all collaborators.
    pub async fn start(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
        run_migrations(&pool).await?;

        let embedder = create_provider(&config.embedding, config.embedding_dims())?;
        let model = create_model(&config.llm)?;

        let index: Arc<dyn VectorIndex> = match config.index.backend.as_str() {
            "memory" => Arc::new(InMemoryIndex::new(config.index.dimension)),
            _ => Arc::new(SqliteIndex::new(pool.clone(), config.index.dimension)),
        };

        let images = Arc::new(FsImageStore::new(
            pool.clone(),
            &config.images.root,
            &config.server.public_url,
        ));

        let intents = match config.intents.seed {
            Some(seed) => IntentHandler::with_seed(seed),
            None => IntentHandler::new(),
        };

        let retriever = Retriever::new(embedder.clone(), index.clone(), config.retrieval.params());
        let chat = ChatService::new(intents, model.clone(), retriever, images.clone());
        let indexer = Indexer::new(embedder.clone(), index, config.chunking.params());

        tracing::info!(
            embedding = embedder.model_name(),
            llm = model.model_name(),
            index = %config.index.backend,
            dimension = config.index.dimension,
            "services started"
        );

        Ok(Self {
            config: config.clone(),
            chat,
            indexer,
            images,
            pool,
        })
    }

    /// Close the database pool. Pending queries finish first.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        tracing::info!("services stopped");
    }
}
