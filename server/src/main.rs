#[tokio::main]
async fn main() -> anyhow::Result<()> {
    refund_server::run().await
}
