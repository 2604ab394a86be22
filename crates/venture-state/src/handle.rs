//! SurrealDB Handle - Connection and Schema
//!
//! Manages the connection used by the SurrealDB-backed storage trait
//! implementations. Supports both local (in-memory) and cloud (WebSocket)
//! connections: `mem://` for tests, `STAGEGATE_DB_*` environment
//! variables for deployments.

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StateError;
use crate::Result;

/// Configuration for a SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "stagegate")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: "stagegate".to_string(),
            database: "main".to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - STAGEGATE_DB_ENDPOINT (required)
    /// - STAGEGATE_DB_USERNAME (required)
    /// - STAGEGATE_DB_PASSWORD (required)
    /// - STAGEGATE_DB_NAMESPACE (optional, default: "stagegate")
    /// - STAGEGATE_DB_DATABASE (optional, default: "main")
    /// - STAGEGATE_DB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("STAGEGATE_DB_ENDPOINT").map_err(|_| "STAGEGATE_DB_ENDPOINT not set")?;
        let username =
            std::env::var("STAGEGATE_DB_USERNAME").map_err(|_| "STAGEGATE_DB_USERNAME not set")?;
        let password =
            std::env::var("STAGEGATE_DB_PASSWORD").map_err(|_| "STAGEGATE_DB_PASSWORD not set")?;
        let namespace =
            std::env::var("STAGEGATE_DB_NAMESPACE").unwrap_or_else(|_| "stagegate".to_string());
        let database =
            std::env::var("STAGEGATE_DB_DATABASE").unwrap_or_else(|_| "main".to_string());
        let is_root = std::env::var("STAGEGATE_DB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for StageGate
#[derive(Clone)]
pub struct SurrealHandle {
    pub(crate) db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");

        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        db.use_ns("stagegate")
            .use_db("main")
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    /// Connect to SurrealDB Cloud
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB Cloud connected and schema initialized");
        Ok(handle)
    }

    /// Connect using environment variables
    ///
    /// If STAGEGATE_DB_ENDPOINT is set, connects to cloud.
    /// If STAGEGATE_DB_URL is set, connects to that URL.
    /// Otherwise, falls back to in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("STAGEGATE_DB_URL") {
            info!("STAGEGATE_DB_URL found, connecting to {}", url);
            let db = surrealdb::engine::any::connect(&url)
                .await
                .map_err(|e| StateError::Connection(e.to_string()))?;

            db.use_ns("stagegate")
                .use_db("main")
                .await
                .map_err(|e| StateError::Connection(e.to_string()))?;

            let handle = SurrealHandle { db };
            handle.init_schema().await?;
            return Ok(handle);
        }

        info!("No cloud config found, using in-memory database");
        Self::setup_db().await
    }

    /// Initialize the database schema.
    ///
    /// Safe to call multiple times (idempotent).
    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing StageGate schema");

        let schema = r#"
            -- Ventures table (system of record)
            DEFINE TABLE ventures SCHEMAFULL;
            DEFINE FIELD venture_id ON ventures TYPE string;
            DEFINE FIELD name ON ventures TYPE string;
            DEFINE FIELD status ON ventures TYPE string;
            DEFINE FIELD current_stage ON ventures TYPE option<int>;
            DEFINE FIELD created_at ON ventures TYPE datetime;
            DEFINE FIELD updated_at ON ventures TYPE datetime;
            DEFINE INDEX idx_venture_id ON ventures FIELDS venture_id UNIQUE;

            -- Stage work table (write-through summaries)
            DEFINE TABLE stage_work SCHEMAFULL;
            DEFINE FIELD venture_id ON stage_work TYPE string;
            DEFINE FIELD stage ON stage_work TYPE int;
            DEFINE FIELD status ON stage_work TYPE string;
            DEFINE FIELD health ON stage_work TYPE string;
            DEFINE FIELD summary ON stage_work FLEXIBLE TYPE object;
            DEFINE FIELD updated_at ON stage_work TYPE datetime;
            DEFINE INDEX idx_stage_work ON stage_work FIELDS venture_id, stage UNIQUE;

            -- Handoffs table
            DEFINE TABLE handoffs SCHEMAFULL;
            DEFINE FIELD handoff_id ON handoffs TYPE string;
            DEFINE FIELD venture_id ON handoffs TYPE string;
            DEFINE FIELD proposed_by ON handoffs TYPE string;
            DEFINE FIELD from_stage ON handoffs TYPE int;
            DEFINE FIELD to_stage ON handoffs TYPE int;
            DEFINE FIELD package ON handoffs FLEXIBLE TYPE object;
            DEFINE FIELD status ON handoffs TYPE string;
            DEFINE FIELD reviewed_by ON handoffs TYPE option<string>;
            DEFINE FIELD review_notes ON handoffs TYPE option<string>;
            DEFINE FIELD proposed_at ON handoffs TYPE datetime;
            DEFINE FIELD resolved_at ON handoffs TYPE option<datetime>;
            DEFINE INDEX idx_handoff_id ON handoffs FIELDS handoff_id UNIQUE;
            DEFINE INDEX idx_handoff_venture ON handoffs FIELDS venture_id;

            -- Artifacts table
            DEFINE TABLE artifacts SCHEMAFULL;
            DEFINE FIELD venture_id ON artifacts TYPE string;
            DEFINE FIELD stage ON artifacts TYPE int;
            DEFINE FIELD kind ON artifacts TYPE string;
            DEFINE FIELD payload ON artifacts FLEXIBLE TYPE object;
            DEFINE FIELD is_current ON artifacts TYPE bool;
            DEFINE FIELD created_at ON artifacts TYPE datetime;
            DEFINE INDEX idx_artifact_lookup ON artifacts FIELDS venture_id, stage, kind;

            -- Audit events table (append-only)
            DEFINE TABLE audit_events SCHEMAFULL
                PERMISSIONS
                    FOR create FULL
                    FOR select FULL
                    FOR update NONE
                    FOR delete NONE;
            DEFINE FIELD event_id ON audit_events TYPE string;
            DEFINE FIELD event_type ON audit_events TYPE string;
            DEFINE FIELD correlation_id ON audit_events TYPE string;
            DEFINE FIELD venture_id ON audit_events TYPE option<string>;
            DEFINE FIELD parent_event_id ON audit_events TYPE option<string>;
            DEFINE FIELD event_data ON audit_events FLEXIBLE TYPE object;
            DEFINE FIELD created_at ON audit_events TYPE datetime;
            DEFINE INDEX idx_event_id ON audit_events FIELDS event_id UNIQUE;
            DEFINE INDEX idx_event_correlation ON audit_events FIELDS correlation_id;

            -- Preferences table
            DEFINE TABLE preferences SCHEMAFULL;
            DEFINE FIELD principal_id ON preferences TYPE string;
            DEFINE FIELD venture_id ON preferences TYPE option<string>;
            DEFINE FIELD key ON preferences TYPE string;
            DEFINE FIELD value ON preferences TYPE any;
            DEFINE INDEX idx_preference_lookup ON preferences FIELDS principal_id, key;

            -- Principals table
            DEFINE TABLE principals SCHEMAFULL;
            DEFINE FIELD principal_id ON principals TYPE string;
            DEFINE FIELD display_name ON principals TYPE string;
            DEFINE FIELD role ON principals TYPE string;
            DEFINE FIELD status ON principals TYPE string;
            DEFINE INDEX idx_principal_id ON principals FIELDS principal_id UNIQUE;

            -- Transition receipts table (idempotency)
            DEFINE TABLE transition_receipts SCHEMAFULL;
            DEFINE FIELD idempotency_key ON transition_receipts TYPE string;
            DEFINE FIELD venture_id ON transition_receipts TYPE string;
            DEFINE FIELD from_stage ON transition_receipts TYPE int;
            DEFINE FIELD to_stage ON transition_receipts TYPE int;
            DEFINE FIELD handoff_id ON transition_receipts TYPE string;
            DEFINE FIELD applied_at ON transition_receipts TYPE datetime;
            DEFINE INDEX idx_receipt_key ON transition_receipts FIELDS idempotency_key UNIQUE;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_surreal_connection_and_schema_creation() {
        let handle = SurrealHandle::setup_db().await;
        assert!(handle.is_ok(), "Failed to connect: {:?}", handle.err());
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        // A second init must not fail.
        handle.init_schema().await.unwrap();
    }

    #[test]
    fn test_cloud_config_builders() {
        let config = CloudConfig::new("wss://db.example", "user", "pass")
            .with_namespace("custom")
            .with_database("other")
            .with_root(true);
        assert_eq!(config.namespace, "custom");
        assert_eq!(config.database, "other");
        assert!(config.is_root);
    }
}
