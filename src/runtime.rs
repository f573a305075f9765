use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::handlers::http::{AppState, routes};
use crate::service::calendar_service::GoogleCalendarService;
use crate::service::contact_extractor::ContactExtractor;
use crate::service::dispatch_service::{CallDispatcher, DispatchLedger};
use crate::service::openai_service::{OpenAIClient, OpenAIService};
use crate::service::phone_call_service::RetellService;
use crate::tasks::calendar_loop;
use crate::tasks::keep_alive_loop;
use crate::tasks::task_runner::TaskRunner;
use crate::tasks::ticker::IntervalTicker;

pub fn build_dispatcher(settings: &Settings, http: Client) -> CallDispatcher {
    let calendar = Arc::new(GoogleCalendarService::new(http.clone(), settings.google.clone()));
    let voice = Arc::new(RetellService::new(http.clone(), settings.retell.clone()));
    let llm = settings.llm.clone().map(|llm_settings| {
        Arc::new(OpenAIService::new(http.clone(), llm_settings)) as Arc<dyn OpenAIClient>
    });
    if llm.is_none() {
        warn!("OPENROUTER_API_KEY not set, contact extraction will use the text fallback only");
    }
    let extractor = ContactExtractor::new(llm, settings.timezone);

    let dispatcher = CallDispatcher::new(calendar, extractor, voice, settings.timezone);
    if settings.dispatch_dedup {
        dispatcher.with_ledger(DispatchLedger::default())
    } else {
        dispatcher
    }
}

pub async fn run_api(settings: Settings) -> Result<()> {
    let http = Client::new();
    let dispatcher = Arc::new(build_dispatcher(&settings, http.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut task_runner = TaskRunner::new();
    task_runner.add_task("calendar_loop", {
        let dispatcher = dispatcher.clone();
        let mut ticker = IntervalTicker::new(settings.poll_interval, shutdown_rx.clone());
        let startup_delay = settings.startup_delay;
        async move {
            calendar_loop::run_calendar_loop(dispatcher, &mut ticker, startup_delay).await;
        }
    });
    if let Some(app_url) = settings.app_url.clone() {
        info!("keep alive service started");
        let mut ticker = IntervalTicker::new(settings.keep_alive_interval, shutdown_rx.clone());
        let http = http.clone();
        task_runner.add_task("keep_alive", async move {
            keep_alive_loop::run_keep_alive_loop(http, app_url, &mut ticker).await;
        });
    }
    let handles = task_runner.start_all();

    let state = Arc::new(AppState::new(dispatcher));
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!(
        port = settings.port,
        poll_interval_secs = settings.poll_interval.as_secs(),
        "server running, calendar monitoring active"
    );

    tokio::select! {
        _ = warp::serve(routes(state)).run(addr) => {}
        _ = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(true);
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
                    _ = terminate.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                warn!(error = %err, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c, shutting down");
    }
}
