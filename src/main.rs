//! Provenance HTTP server entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    audit_provenance::server::run().await
}
