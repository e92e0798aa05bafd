//! Database layer for CiteIndex
//!
//! Provides:
//! - SeaORM entity models
//! - Repository implementing the collaborator traits
//! - Connection pool management and schema bootstrap

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::*;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub connection: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let connection = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e)
            })?;

        info!("Database connection established");

        Ok(Self { connection })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Create any missing tables from the entity definitions
    pub async fn ensure_schema(&self) -> Result<()> {
        let backend = self.connection.get_database_backend();
        let schema = Schema::new(backend);

        // Referenced tables first
        let mut statements = vec![
            schema.create_table_from_entity(PatentEntity),
            schema.create_table_from_entity(PartitionEntity),
            schema.create_table_from_entity(CdIndexEntity),
            schema.create_table_from_entity(PairSimilarityEntity),
            schema.create_table_from_entity(MissingCitationEntity),
        ];

        for statement in statements.iter_mut() {
            statement.if_not_exists();
            self.connection.execute(backend.build(&*statement)).await?;
        }

        info!(tables = statements.len(), "Schema ensured");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.connection
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}
