pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{
    AppComponents, OidcServer, ServerBuilder, assemble, build_app, build_components, build_router,
    spawn_cleanup,
};
