mod init;
mod requests;
mod server;

use planbook_core::Store;
use rmcp::ServiceExt;
use server::PlanbookServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol; env_logger writes to stderr
    env_logger::init();

    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("init") {
        return init::init_project(args.next());
    }

    let store = Store::open_default();
    log::info!("planbook-mcp starting, data in {}", store.root().display());

    let service = PlanbookServer::new(store)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| log::error!("MCP server error: {e}"))?;
    service.waiting().await?;
    Ok(())
}
