use anyhow::Result;
use sqlx::SqlitePool;

/// Create the `vectors` and `images` tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            segment TEXT NOT NULL,
            id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata_json TEXT,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (segment, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            category TEXT NOT NULL,
            filename TEXT NOT NULL,
            label TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            content_type TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (category, filename)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_category ON images(category, created_at)")
        .execute(pool)
        .await?;

    Ok(())
}
