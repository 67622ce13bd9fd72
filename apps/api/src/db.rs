use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        email TEXT PRIMARY KEY,
        phone TEXT,
        state TEXT,
        city TEXT,
        neighborhood TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile (
        email TEXT PRIMARY KEY,
        education_json TEXT NOT NULL DEFAULT '[]',
        certifications_json TEXT NOT NULL DEFAULT '[]',
        languages_json TEXT NOT NULL DEFAULT '[]',
        experience_json TEXT NOT NULL DEFAULT '[]',
        FOREIGN KEY (email) REFERENCES users (email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS skills (
        email TEXT NOT NULL,
        skill TEXT NOT NULL,
        details_json TEXT NOT NULL,
        PRIMARY KEY (email, skill),
        FOREIGN KEY (email) REFERENCES users (email)
    )
    "#,
];

/// Creates a SQLite connection pool, creating the database file if needed.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Opening SQLite database at {database_url}...");

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid DATABASE_URL '{database_url}'"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("SQLite connection pool established");
    Ok(pool)
}

/// Creates the fact tables if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(*statement)
            .execute(pool)
            .await
            .context("Failed to create fact store schema")?;
    }
    info!("Fact store schema ready");
    Ok(())
}
