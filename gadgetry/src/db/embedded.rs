//! Embedded PostgreSQL database support
//!
//! Runs a bundled PostgreSQL instance that starts and stops with the service, so a single
//! binary can run without an external database. Only available with the `embedded-db`
//! feature; PostgreSQL binaries are bundled into the binary at compile time.

#[cfg(feature = "embedded-db")]
use postgresql_embedded::{PostgreSQL, Settings, V16};
#[cfg(feature = "embedded-db")]
use std::path::PathBuf;
#[cfg(feature = "embedded-db")]
use tracing::{debug, info};

#[cfg(feature = "embedded-db")]
const DATABASE_NAME: &str = "gadgetry";

/// `$HOME/.gadgetry_data/postgres`, or a relative directory when there is no home
#[cfg(feature = "embedded-db")]
fn default_data_dir() -> PathBuf {
    match std::env::home_dir() {
        Some(home) => home.join(".gadgetry_data").join("postgres"),
        None => PathBuf::from("gadgetry_data/postgres"),
    }
}

/// Server settings rooted at `root`: binaries under `installation/`, cluster under `data/`.
/// Port 0 lets the OS pick a free port.
#[cfg(feature = "embedded-db")]
fn settings(root: PathBuf, persistent: bool) -> Settings {
    Settings {
        version: V16.clone(),
        port: 0,
        username: "postgres".to_string(),
        password: "password".to_string(),
        temporary: !persistent,
        installation_dir: root.join("installation"),
        data_dir: root.join("data"),
        ..Default::default()
    }
}

#[cfg(feature = "embedded-db")]
pub struct EmbeddedDatabase {
    postgres: PostgreSQL,
    connection_string: String,
}

#[cfg(feature = "embedded-db")]
impl EmbeddedDatabase {
    /// Create and start a new embedded PostgreSQL instance on an OS-assigned port
    ///
    /// # Arguments
    /// * `data_dir` - Directory where PostgreSQL data will be stored (default: `$HOME/.gadgetry_data/postgres`)
    /// * `persistent` - Whether to persist data between restarts
    pub async fn start(data_dir: Option<PathBuf>, persistent: bool) -> anyhow::Result<Self> {
        let settings = settings(data_dir.unwrap_or_else(default_data_dir), persistent);

        if persistent {
            debug!("Starting embedded PostgreSQL with data directory: {}", settings.data_dir.display());
        } else {
            debug!("Starting ephemeral embedded PostgreSQL");
        }

        let mut postgres = PostgreSQL::new(settings);

        postgres
            .setup()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to setup embedded PostgreSQL: {}", e))?;

        postgres
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start embedded PostgreSQL: {}", e))?;

        // A persistent data directory already holds the database after the first run
        let exists = postgres
            .database_exists(DATABASE_NAME)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to inspect embedded PostgreSQL: {}", e))?;
        if !exists {
            postgres
                .create_database(DATABASE_NAME)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create database '{}': {}", DATABASE_NAME, e))?;
        }

        let connection_string = postgres.settings().url(DATABASE_NAME);

        info!("Embedded PostgreSQL started successfully on port {}", postgres.settings().port);

        Ok(Self {
            postgres,
            connection_string,
        })
    }

    /// Get the connection string for this embedded database
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Stop the embedded PostgreSQL instance
    pub async fn stop(self) -> anyhow::Result<()> {
        info!("Stopping embedded PostgreSQL...");
        self.postgres
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to stop embedded PostgreSQL: {}", e))?;
        info!("Embedded PostgreSQL stopped");
        Ok(())
    }
}

#[cfg(not(feature = "embedded-db"))]
pub struct EmbeddedDatabase;

#[cfg(not(feature = "embedded-db"))]
impl EmbeddedDatabase {
    pub async fn stop(self) -> anyhow::Result<()> {
        Ok(())
    }
}
