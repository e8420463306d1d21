//!
//! # Database Module for logvault
//!
//! This module provides database management functionality for the log store.
//! It handles database initialization, connection management, and schema
//! migrations for the `application_logs` table.
//!
//! ## Features
//!
//! - **Database Initialization**: Creates the SQLite database file and migrations table if needed.
//! - **Connection Management**: Provides the connection pool the log store runs on.
//! - **Migration Control**: Tracks and applies migrations, never silently.
//! - **CLI Support**: Commands to list and apply migrations and inspect the schema.

use sqlx::{Row, Sqlite, migrate::MigrateDatabase, sqlite::SqlitePool};
use std::collections::HashMap;
use tracing::{error, info, warn};

pub const DEFAULT_DB_URL: &str = "sqlite://logvault.db";

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Database manager that handles initialization and migrations
pub struct DatabaseManager {
    pool: SqlitePool,
}

/// Represents a database migration with version and SQL
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub sql: String,
}

impl DatabaseManager {
    /// Create a new manager with a connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database, creating the file if it doesn't exist
    pub async fn connect_with_file_creation(database_url: &str) -> Result<Self, sqlx::Error> {
        info!("Opening log store at: {}", database_url);

        // if it does not exist, create and apply migrations then leave
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Database does not exist at {}, creating it", database_url);
            Sqlite::create_database(database_url).await?;

            let pool = SqlitePool::connect(database_url).await?;
            sqlx::query("SELECT 1").execute(&pool).await?;
            info!("Database created successfully at {}", database_url);

            let db_manager = Self::new(pool);
            db_manager.create_migrations_table().await?;
            db_manager.apply_pending_migrations().await?;
            info!("Initial migrations applied, log store is ready.");
            return Ok(db_manager);
        }

        let pool = SqlitePool::connect(database_url).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Initialize the database by creating the migrations table if needed
    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        self.create_migrations_table().await?;
        let (_applied, pending) = self.migration_status().await?;
        if !pending.is_empty() {
            warn!("Pending migrations: {:?}", pending);
        } else {
            info!("No pending migrations.");
        }
        Ok(())
    }

    /// Create the migrations tracking table
    async fn create_migrations_table(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get all available migrations in order
    fn get_migrations(&self) -> Vec<Migration> {
        vec![Migration {
            version: 1,
            name: "application_logs".to_string(),
            sql: r#"
                CREATE TABLE IF NOT EXISTS application_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    message TEXT NOT NULL,
                    level TEXT NOT NULL,
                    context TEXT NOT NULL,
                    creation_date TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_application_logs_creation_date
                    ON application_logs(creation_date);
            "#
            .to_string(),
        }]
    }

    /// Get applied migrations as a map (version -> name)
    async fn get_applied_migrations(&self) -> Result<HashMap<u32, String>, sqlx::Error> {
        let rows = sqlx::query("SELECT version, name FROM migrations ORDER BY version")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("version"), row.get("name")))
            .collect())
    }

    /// Check migration status: returns (applied, pending) versions
    pub async fn migration_status(&self) -> Result<(Vec<u32>, Vec<u32>), sqlx::Error> {
        let all_migrations = self.get_migrations();
        let applied_migrations = self.get_applied_migrations().await?;
        let mut applied = Vec::new();
        let mut pending = Vec::new();

        for migration in all_migrations {
            if applied_migrations.contains_key(&migration.version) {
                applied.push(migration.version);
            } else {
                pending.push(migration.version);
            }
        }

        applied.sort();
        pending.sort();
        Ok((applied, pending))
    }

    /// Apply all pending migrations in order
    pub async fn apply_pending_migrations(&self) -> Result<(), sqlx::Error> {
        let migrations = self.get_migrations();
        let applied_migrations = self.get_applied_migrations().await?;

        for migration in migrations {
            if !applied_migrations.contains_key(&migration.version) {
                info!("Applying migration {}: {}", migration.version, migration.name);
                sqlx::query(&migration.sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        error!("Failed to apply migration {}: {}", migration.version, e);
                        e
                    })?;
                sqlx::query("INSERT INTO migrations (version, name) VALUES (?, ?)")
                    .bind(migration.version)
                    .bind(&migration.name)
                    .execute(&self.pool)
                    .await?;
                info!("Applied migration {}: {}", migration.version, migration.name);
            }
        }
        Ok(())
    }

    /// Get the connection pool.
    #[allow(dead_code)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// CLI command implementations for migrations.
pub struct MigrationCli {
    db_manager: DatabaseManager,
}

impl MigrationCli {
    pub fn new(db_manager: DatabaseManager) -> Self {
        Self { db_manager }
    }

    /// CLI command: List migration status
    pub async fn list_migrations(&self) -> Result<(), sqlx::Error> {
        let (applied, pending) = self.db_manager.migration_status().await?;
        println!("Applied migrations: {:?}", applied);
        println!("Pending migrations: {:?}", pending);
        Ok(())
    }

    /// CLI command: Apply all pending migrations
    pub async fn apply_migrations(&self) -> Result<(), sqlx::Error> {
        self.db_manager.apply_pending_migrations().await?;
        println!("All pending migrations applied.");
        Ok(())
    }

    /// CLI command: View the schema of all tables in the database
    pub async fn view_schema(&self) -> Result<(), sqlx::Error> {
        let tables = sqlx::query("SELECT name FROM sqlite_master WHERE type='table'")
            .fetch_all(&self.db_manager.pool)
            .await?;

        for table in tables {
            let table_name: String = table.get("name");
            println!("Schema for table '{}':", table_name);
            let schema = sqlx::query(&format!("PRAGMA table_info({})", table_name))
                .fetch_all(&self.db_manager.pool)
                .await?;
            for column in schema {
                println!(
                    "\t{}: {} ({})",
                    column.get::<String, _>("name"),
                    column.get::<String, _>("type"),
                    if column.get::<i64, _>("pk") > 0 { "PK" } else { "" }
                );
            }
        }
        Ok(())
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Initialize the database and hand back the pool the service runs on
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let db_manager = DatabaseManager::connect_with_file_creation(database_url).await?;
    db_manager.initialize().await?;
    Ok(db_manager.pool)
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
