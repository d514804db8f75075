//! CLI command implementations.
//!
//! Each `run_*` function backs one `campus` subcommand and prints a
//! human-readable summary on stdout.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use campus_assistant_core::category::GENERAL_CATEGORY;
use campus_assistant_core::indexer::IndexMetadata;
use campus_assistant_core::models::ChatRequest;

use crate::config::Config;
use crate::db;
use crate::extract::{default_label_prefix, extract_text, DocumentKind};
use crate::migrate::run_migrations;
use crate::services::Services;

/// Create the database tables and the image root.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;
    pool.close().await;

    std::fs::create_dir_all(&config.images.root).with_context(|| {
        format!(
            "Failed to create image root {}",
            config.images.root.display()
        )
    })?;

    println!("Database initialized at {}", config.db.path.display());
    println!("Image root: {}", config.images.root.display());
    Ok(())
}

/// Index a text or PDF file. Images embedded in a PDF are saved too unless
/// `extract_images` is false.
pub async fn run_index(
    config: &Config,
    file: &Path,
    category: Option<String>,
    source: Option<String>,
    namespace: Option<String>,
    extract_images: bool,
    image_label_prefix: Option<String>,
) -> Result<()> {
    if config.index.backend == "memory" {
        bail!("index.backend = \"memory\" does not persist; use the HTTP API or switch to sqlite");
    }
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());
    let (kind, text) = extract_text(&filename, &bytes)?;

    let mut extra = BTreeMap::new();
    extra.insert("filename".to_string(), filename.clone());
    if kind == DocumentKind::Pdf {
        extra.insert("type".to_string(), kind.as_str().to_string());
    }
    let metadata = IndexMetadata {
        category: Some(category.unwrap_or_else(|| GENERAL_CATEGORY.to_string())),
        source: Some(source.unwrap_or_else(|| filename.clone())),
        extra,
    };

    let services = Services::start(config).await?;
    let report = services
        .indexer
        .index_text(&text, metadata, namespace.as_deref())
        .await;
    let images = if kind == DocumentKind::Pdf && extract_images {
        let prefix = image_label_prefix.unwrap_or_else(|| default_label_prefix(&filename));
        services
            .images
            .save_pdf_images(&bytes, &report.category, &prefix)
            .await
    } else {
        Vec::new()
    };
    services.shutdown().await;

    println!("{}", report.message);
    println!("  Namespace:   {}", display_segment(&report.namespace));
    println!("  Category:    {}", report.category);
    println!("  Indexed:     {}", report.chunks_indexed);
    println!("  Failed:      {}", report.chunks_failed);
    if kind == DocumentKind::Pdf {
        println!("  Images:      {}", images.len());
    }
    if !report.success {
        bail!("indexing {} failed", file.display());
    }
    Ok(())
}

/// Answer one question and print the answer with its sources.
pub async fn run_ask(
    config: &Config,
    question: &str,
    no_rag: bool,
    conversation_id: Option<String>,
) -> Result<()> {
    let services = Services::start(config).await?;
    let mut request = ChatRequest::new(question);
    request.use_rag = !no_rag;
    request.conversation_id = conversation_id;
    let result = services.chat.answer(request).await;
    services.shutdown().await;
    let response = result?;

    println!("{}", response.answer);
    println!();
    if let Some(category) = &response.category {
        println!("  Category:    {}", category);
    }
    println!("  Conversation: {}", response.conversation_id);
    if !response.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in response.sources.iter().enumerate() {
            println!(
                "  {}. [{:.3}] {} ({})",
                i + 1,
                source.score,
                source.id,
                display_segment(&source.namespace)
            );
        }
    }
    for image in &response.images {
        println!("  Image: {} {}", image.label, image.url);
    }
    Ok(())
}

/// Print per-segment record counts.
pub async fn run_stats(config: &Config) -> Result<()> {
    let services = Services::start(config).await?;
    let stats = services.indexer.stats().await;
    services.shutdown().await;
    let stats = stats?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Campus Assistant: Index Stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Backend:     {}", config.index.backend);
    println!("  Dimension:   {}", stats.dimension);
    println!("  Records:     {}", stats.total_records);
    println!();
    if stats.segments.is_empty() {
        println!("  (index is empty)");
    } else {
        println!("  {:<24} {:>8}", "NAMESPACE", "RECORDS");
        for (segment, count) in &stats.segments {
            println!("  {:<24} {:>8}", display_segment(segment), count);
        }
    }
    Ok(())
}

/// Remove every record of a namespace.
pub async fn run_wipe(config: &Config, namespace: &str) -> Result<()> {
    let services = Services::start(config).await?;
    let result = services.indexer.wipe(namespace).await;
    services.shutdown().await;
    result?;
    println!("Wiped namespace {}", display_segment(namespace));
    Ok(())
}

fn display_segment(name: &str) -> &str {
    if name.is_empty() {
        "(default)"
    } else {
        name
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_display_segment() {
        assert_eq!(display_segment(""), "(default)");
        assert_eq!(display_segment("events"), "events");
    }
}
