use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AtriumError, Result};
use crate::factories::switch_factory::SwitchBuilder;
use crate::interfaces::transport::{EventStream, Transport};
use crate::plugins::registry::HandlerRegistry;
use crate::services::routing::{Forwarded, Switch};
use crate::services::transport::RedisTransport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub forwarded: u64,
    pub dropped: u64,
    pub ignored: u64,
}

/// Resolves when `signal` fires. A signal that cannot be installed is logged
/// and never resolves, so the daemon keeps serving.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>> + Send,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!(error = %err, "failed to install shutdown signal handler");
            futures::future::pending::<()>().await;
        }
    }
}

pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(
        config,
        HandlerRegistry::with_builtins(),
        futures::future::pending::<()>(),
    )
    .await
    .map(|_| ())
}

pub async fn run_with_shutdown<F>(
    config: Config,
    registry: HandlerRegistry,
    shutdown: F,
) -> Result<ServeStats>
where
    F: Future<Output = ()> + Send,
{
    let url = config.settings.redis_url();
    info!(%url, "connecting to transport");
    let transport = RedisTransport::connect(&url).await?;
    run_with_transport(config, Arc::new(transport), registry, shutdown).await
}

pub async fn run_with_transport<F>(
    config: Config,
    transport: Arc<dyn Transport>,
    registry: HandlerRegistry,
    shutdown: F,
) -> Result<ServeStats>
where
    F: Future<Output = ()> + Send,
{
    let switch = SwitchBuilder::new(transport.clone(), registry)
        .build(&config)
        .await?;
    let settings = &config.settings;
    let stats = serve(
        transport.as_ref(),
        &switch,
        &settings.ingress_channel,
        settings.receive_timeout(),
        shutdown,
    )
    .await;
    switch.shutdown();
    stats
}

pub async fn serve<F>(
    transport: &dyn Transport,
    switch: &Switch,
    ingress: &str,
    receive_timeout: Duration,
    shutdown: F,
) -> Result<ServeStats>
where
    F: Future<Output = ()> + Send,
{
    let events = transport.subscribe(ingress).await?;
    serve_events(switch, ingress, events, receive_timeout, shutdown).await
}

pub async fn serve_events<F>(
    switch: &Switch,
    ingress: &str,
    mut events: EventStream,
    receive_timeout: Duration,
    shutdown: F,
) -> Result<ServeStats>
where
    F: Future<Output = ()> + Send,
{
    let mut stats = ServeStats::default();
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => {
                info!(?stats, "serving loop stopped");
                return Ok(stats);
            }
            next = tokio::time::timeout(receive_timeout, events.next()) => next,
        };

        let event = match next {
            Err(_) => {
                info!(
                    %ingress,
                    nodes = switch.node_count(),
                    "waiting for messages"
                );
                continue;
            }
            Ok(None) => {
                return Err(AtriumError::Transport(format!(
                    "ingress subscription `{ingress}` closed"
                )))
            }
            Ok(Some(event)) => event,
        };

        match switch.forward(&event).await {
            Ok(Forwarded::Ignored) => stats.ignored += 1,
            Ok(Forwarded::Delivered { .. }) => stats.forwarded += 1,
            Err(err) if err.is_recoverable() => {
                stats.dropped += 1;
                warn!(error = %err, "message dropped");
            }
            Err(err) => {
                stats.dropped += 1;
                error!(error = %err, "forward failed; message dropped");
            }
        }
    }
}
