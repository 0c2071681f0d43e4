//! Drivers wired to [`ToyServer`] over a framed in-memory pipe.

mod server;

pub use server::{ToyServer, KEYWORDS};

use fourslash_lsp::{HarnessConfig, QueryDriver, StdioService};
use std::sync::Arc;
use tower_lsp::{LspService, Server};

/// Serve a fresh [`ToyServer`] on one end of a duplex pipe and connect a
/// [`StdioService`] to the other.
pub fn stdio_service() -> StdioService {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (client_read, client_write) = tokio::io::split(client_io);

    let (service, socket) = LspService::new(ToyServer::new);
    tokio::spawn(Server::new(server_read, server_write, socket).serve(service));

    StdioService::connect(client_read, client_write)
}

/// A started driver for `fixture`.
pub async fn start(fixture: &str) -> QueryDriver {
    start_with_config(fixture, HarnessConfig::default()).await
}

pub async fn start_with_config(fixture: &str, config: HarnessConfig) -> QueryDriver {
    fourslash_lsp::logging::init();
    let service = Arc::new(stdio_service());
    let mut driver =
        QueryDriver::from_fixture(fixture, service, config).expect("Fixture should parse");
    driver.start().await.expect("Initialize failed");
    driver
}
