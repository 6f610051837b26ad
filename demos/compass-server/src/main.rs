//! The Orbit gateway as a standalone server binary.
//!
//! Serves the compass/map client: create a session, share the 6-digit
//! code, everyone's position and signals flow through here.
//!
//! ```text
//! ORBIT_ADDR=0.0.0.0:8080 RUST_LOG=orbit=debug cargo run -p compass-server
//! ```

use orbit::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr =
        std::env::var("ORBIT_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let gateway = Gateway::<JsonCodec>::builder().bind(&addr).build().await?;
    tracing::info!(addr = %gateway.local_addr()?, "compass server listening");

    let shutdown = gateway.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            shutdown.shutdown();
        }
    });

    gateway.run().await?;
    Ok(())
}
