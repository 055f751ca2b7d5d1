//! SurrealDB connection management.
//!
//! The server talks to a remote SurrealDB over WebSocket. Tests and local
//! tooling open the same schema on the embedded in-memory engine. Either
//! way a [`DbManager`] is only handed out once the namespace is selected
//! and every migration has been applied.

use surrealdb::engine::local::{Db, Mem};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::schema;

/// Where the Scholaris data lives.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`). Unused in memory.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "scholaris".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// A migrated SurrealDB handle. Defaults to the WebSocket client the
/// server runs on.
#[derive(Clone)]
pub struct DbManager<C: Connection = Client> {
    db: Surreal<C>,
    schema_version: u32,
}

impl DbManager<Client> {
    /// Connect over WebSocket and sign in as root before migrating.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(url = %config.url, "Connecting to SurrealDB");

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        Self::prepare(db, config).await
    }
}

impl DbManager<Db> {
    /// A fresh, empty in-memory store carrying the current schema.
    pub async fn in_memory(config: &DbConfig) -> Result<Self, DbError> {
        let db = Surreal::new::<Mem>(()).await?;
        Self::prepare(db, config).await
    }
}

impl<C: Connection> DbManager<C> {
    async fn prepare(db: Surreal<C>, config: &DbConfig) -> Result<Self, DbError> {
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;
        schema::run_migrations(&db).await?;

        let schema_version = schema::latest_schema_version();
        info!(
            namespace = %config.namespace,
            database = %config.database,
            schema_version,
            "Database ready"
        );
        Ok(Self { db, schema_version })
    }

    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }

    pub fn into_client(self) -> Surreal<C> {
        self.db
    }

    /// Schema version applied when the manager was built.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }
}
