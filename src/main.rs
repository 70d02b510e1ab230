#[tokio::main]
async fn main() {
    if let Err(e) = arcade_sync::run_with_config().await {
        eprintln!("arcade_sync failed: {e}");
        std::process::exit(1);
    }
}
