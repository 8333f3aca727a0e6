#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rvdash_client::host::run().await
}
