//! Pool construction for the artifact and account tables.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::Postgres;
use tracing::{debug, info, instrument};
use url::Url;

use crate::PgPool;
use crate::config::PostgresConfig;
use crate::error::Result;

/// Default connection lifetime when `max_lifetime_secs` is unset.
const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Translates [`PostgresConfig`] into sqlx pool options.
///
/// At least one idle connection is kept so the first login after a quiet
/// period does not pay for a handshake.
#[must_use]
pub fn pool_options(config: &PostgresConfig) -> PoolOptions<Postgres> {
    let min_connections = config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .clamp(1, config.pool_size.max(1));

    PoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(
            config
                .max_lifetime_secs
                .map_or(DEFAULT_MAX_LIFETIME, Duration::from_secs),
        )
        .idle_timeout(config.idle_timeout_ms.map(Duration::from_millis))
}

/// `host:port/database` of a connection URL, without credentials.
fn endpoint(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!(
            "{}:{}{}",
            parsed.host_str().unwrap_or("localhost"),
            parsed.port().unwrap_or(5432),
            parsed.path()
        ),
        Err(_) => "<unparseable url>".to_string(),
    }
}

/// Connects the pool used by [`PostgresArtifactStore`](crate::PostgresArtifactStore)
/// and [`PostgresAccountResolver`](crate::PostgresAccountResolver).
#[instrument(skip(config), fields(endpoint = %endpoint(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let options = pool_options(config);
    info!(
        max = options.get_max_connections(),
        min = options.get_min_connections(),
        "Connecting artifact store pool"
    );

    let pool = options.connect(&config.url).await?;
    debug!("Artifact store pool ready");
    Ok(pool)
}
