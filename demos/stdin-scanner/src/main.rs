//! Keyboard-wedge scanner bridge.
//!
//! Reads one barcode per line from stdin and forwards it to the server
//! named by `SCANLINK_ENV` / `SCANLINK_URL`. Status lines are logged under
//! the `scanlink::status` target; set `RUST_LOG=scanlink=debug` for more.
//!
//! ```text
//! SCANLINK_URL=ws://127.0.0.1:8080/?type=scanner cargo run -p stdin-scanner
//! SCANLINK_ENV=production cargo run -p stdin-scanner --features tls
//! ```

use std::sync::Arc;

use scanlink::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    scanlink::init_tracing();

    let config = BridgeConfig::from_env()?;
    tracing::info!(
        environment = %config.environment,
        endpoint = %config.endpoint(),
        "starting stdin scanner"
    );

    let bridge = ScannerBridge::new(
        &config,
        WebSocketTransport::new(),
        LineScanSource::stdin(),
        Arc::new(TracingStatus),
    );
    bridge
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
