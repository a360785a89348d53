use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nbrt_mock::{MockState, router};

#[derive(Parser)]
#[command(name = "nbrt-mock")]
#[command(about = "In-memory notebook runtime template API for local testing")]
struct Args {
    /// HTTP listen address
    #[arg(short, long, default_value = "127.0.0.1:8085")]
    listen: SocketAddr,

    /// Bearer token clients must present
    #[arg(short, long, default_value = "dev-token")]
    token: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nbrt_mock=info".parse()?))
        .init();

    let args = Args::parse();
    let app = router(MockState::new(&args.token));

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(
        addr = %listener.local_addr()?,
        endpoint = %format!("http://{}/v1beta1", listener.local_addr()?),
        "Mock server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
