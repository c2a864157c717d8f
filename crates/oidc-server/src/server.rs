use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use oidc_interaction::{
    AccountResolver, ClientRegistry, GrantService, InteractionController, InteractionHttpState,
    StaticAccountResolver, StoreInteractionProvider, TtlPolicyTable, interaction_router,
};
use oidc_store::{DynArtifactStore, MemoryArtifactStore};
use oidc_store_postgres::{PostgresAccountResolver, PostgresArtifactStore, create_pool, migrations};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, StorageBackend};
use crate::handlers;

/// Everything the routes are built from.
///
/// Kept separate from the router so tests and embedders can seed
/// interactions through `provider`.
#[derive(Clone)]
pub struct AppComponents {
    pub store: DynArtifactStore,
    pub provider: Arc<StoreInteractionProvider>,
    pub controller: Arc<InteractionController>,
    pub grants: GrantService,
}

/// Builds the store, account resolver, provider and controller for `cfg`.
///
/// Connects to PostgreSQL and applies migrations when that backend is
/// selected.
pub async fn build_components(cfg: &AppConfig) -> anyhow::Result<AppComponents> {
    let (store, accounts): (DynArtifactStore, Arc<dyn AccountResolver>) = match cfg.storage.backend
    {
        StorageBackend::Memory => {
            tracing::info!(
                accounts = cfg.provider.accounts.len(),
                "Using in-memory artifact store"
            );
            (
                Arc::new(MemoryArtifactStore::new()),
                Arc::new(StaticAccountResolver::new(cfg.provider.accounts.clone())),
            )
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .storage
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.postgres config is required"))?;
            let pool = Arc::new(create_pool(pg).await?);
            if pg.run_migrations {
                migrations::run(&pool).await?;
            }
            tracing::info!("Using PostgreSQL artifact store");
            (
                Arc::new(PostgresArtifactStore::new(pool.clone())),
                Arc::new(PostgresAccountResolver::new(pool)),
            )
        }
    };

    Ok(assemble(cfg, store, accounts))
}

/// Wires the provider and controller over an existing store.
pub fn assemble(
    cfg: &AppConfig,
    store: DynArtifactStore,
    accounts: Arc<dyn AccountResolver>,
) -> AppComponents {
    let ttl = TtlPolicyTable::new(cfg.provider.ttl.clone());
    let provider = Arc::new(StoreInteractionProvider::new(
        store.clone(),
        ClientRegistry::new(cfg.provider.clients.clone()),
        ttl.clone(),
    ));
    let grants = GrantService::new(store.clone(), ttl);
    let controller = Arc::new(InteractionController::new(
        provider.clone(),
        accounts,
        grants.clone(),
    ));

    AppComponents {
        store,
        provider,
        controller,
        grants,
    }
}

pub fn build_router(cfg: &AppConfig, components: &AppComponents) -> Router {
    let interaction_state = InteractionHttpState {
        controller: components.controller.clone(),
    };

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(interaction_router(interaction_state))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.target = %req.uri().path(),
                )
            }),
        )
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes))
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let components = build_components(cfg).await?;
    Ok(build_router(cfg, &components))
}

/// Periodically purges expired artifacts.
pub fn spawn_cleanup(store: DynArtifactStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired artifacts purged"),
                Err(e) => tracing::warn!(error = %e, "Expired artifact cleanup failed"),
            }
        }
    })
}

pub struct OidcServer {
    addr: SocketAddr,
    app: Router,
    cleanup: Option<JoinHandle<()>>,
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<OidcServer> {
        let components = build_components(&self.config).await?;
        let app = build_router(&self.config, &components);
        let cleanup = self
            .config
            .storage
            .cleanup_interval
            .map(|every| spawn_cleanup(components.store.clone(), every));

        Ok(OidcServer {
            addr: self.config.addr(),
            app,
            cleanup,
        })
    }
}

impl OidcServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        if let Some(cleanup) = self.cleanup {
            cleanup.abort();
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use oidc_store::{ArtifactKind, ArtifactStore, ManualClock, Payload};

    use super::*;

    #[tokio::test]
    async fn cleanup_task_purges_expired() {
        let clock = ManualClock::default();
        let store = Arc::new(MemoryArtifactStore::with_clock(Arc::new(clock.clone())));
        store
            .upsert(
                ArtifactKind::AuthorizationCode,
                "code-1",
                Payload::new(serde_json::json!({})),
                Some(1),
            )
            .await
            .unwrap();
        clock.advance(time::Duration::seconds(2));

        let handle = spawn_cleanup(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(store.is_empty());
    }
}
