// Music.AI terminal host
// Logs go to stderr so the progress and status lines stay readable on stdout

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Use RUST_LOG env var if set, otherwise default to info
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    musicai_lib::run(std::env::args().skip(1).collect()).await
}
