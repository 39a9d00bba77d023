//! MongoDB document source
//!
//! This module provides the client for reading ordered batches from a MongoDB
//! collection.

use super::traits::DocumentSource;
use crate::config::SourceConfig;
use crate::domain::{Result, StowageError};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};

/// MongoDB source for one collection
pub struct MongoSource {
    client: Client,

    /// Configuration
    config: SourceConfig,
}

impl MongoSource {
    /// Connect to MongoDB and verify the connection with a ping
    ///
    /// # Arguments
    ///
    /// * `config` - Source configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the server
    /// does not answer within the server selection timeout.
    pub async fn connect(config: SourceConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(config.connection_uri())
            .await
            .map_err(|e| StowageError::Configuration(format!("Invalid MongoDB settings: {e}")))?;
        options.server_selection_timeout = Some(config.server_selection_timeout());
        options.connect_timeout = Some(config.connect_timeout());
        options.app_name = Some("stowage".to_string());

        let client = Client::with_options(options)
            .map_err(|e| StowageError::Source(format!("Failed to create MongoDB client: {e}")))?;

        let source = Self { client, config };
        source.ping().await?;

        tracing::info!(
            host = %source.config.host,
            port = source.config.port,
            database = %source.config.database,
            collection = %source.config.collection,
            "Connected to MongoDB"
        );
        Ok(source)
    }

    fn collection(&self) -> Collection<Document> {
        self.client
            .database(&self.config.database)
            .collection(&self.config.collection)
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.config.auth_source)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StowageError::Source(format!("MongoDB ping failed: {e}")))?;
        Ok(())
    }

    async fn fetch_batch(
        &self,
        sort_field: &str,
        after: Option<&Bson>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let mut filter = Document::new();
        if let Some(value) = after {
            filter.insert(sort_field, doc! { "$gt": value.clone() });
        }
        let mut sort = Document::new();
        sort.insert(sort_field, 1);

        let cursor = self
            .collection()
            .find(filter)
            .sort(sort)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?;
        let batch: Vec<Document> = cursor.try_collect().await?;

        tracing::trace!(rows = batch.len(), "Fetched batch");
        Ok(batch)
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.config.database, self.config.collection)
    }
}
