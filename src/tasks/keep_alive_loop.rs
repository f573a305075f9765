use reqwest::Client;
use tracing::{info, warn};

use crate::tasks::ticker::Ticker;

/// Pings `{app_url}/health` on every tick. Failures are logged and ignored.
pub async fn run_keep_alive_loop<T: Ticker + ?Sized>(
    http: Client,
    app_url: String,
    ticker: &mut T,
) {
    let url = format!("{}/health", app_url.trim_end_matches('/'));
    while ticker.tick().await {
        match http.get(&url).send().await {
            Ok(response) => info!(status = response.status().as_u16(), "keep alive ping succeeded"),
            Err(err) => warn!(error = %err, "keep alive ping failed"),
        }
    }
}
