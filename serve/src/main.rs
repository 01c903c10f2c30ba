//! Binary entry for the archive orchestrator.

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_and_apply("archive", None) {
        eprintln!("failed to load configuration: {e}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Configuration errors at boot are fatal.
    let settings = match archive::Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = serve::run(settings).await {
        eprintln!("orchestrator failed: {e}");
        std::process::exit(1);
    }
}
