//! x402-ledger service binary.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    x402_ledger::server::run().await
}
