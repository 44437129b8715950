#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vehi::run().await
}
