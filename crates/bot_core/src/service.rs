use std::{future::Future, sync::Arc, time::Duration};

use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::{
    router::{ActionRouter, Reply},
    transport::{ChatTransport, InboundEvent, ReplyTarget},
};

pub const POLL_BACKOFF: Duration = Duration::from_secs(3);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runs one event through the router.
pub async fn handle_event(router: &ActionRouter, event: &InboundEvent) -> Reply {
    match event {
        InboundEvent::Action { user_id, token, .. } => router.handle_action(*user_id, token).await,
        InboundEvent::Text {
            target,
            user_id,
            display_name,
            text,
        } => {
            info!(chat_id = %target.chat_id, user_id = %user_id, text, "message received");
            router
                .handle_text(*user_id, display_name.as_deref(), text)
                .await
        }
    }
}

/// Delivers a reply: notice first, so a callback is answered before the
/// message edit lands.
pub async fn deliver<T: ChatTransport + ?Sized>(
    transport: &T,
    target: &ReplyTarget,
    reply: &Reply,
) -> anyhow::Result<()> {
    match &reply.notice {
        Some(notice) => transport.send_notice(target, notice).await?,
        None if target.is_callback() => transport.acknowledge(target).await?,
        None => {}
    }
    if let Some(screen) = &reply.screen {
        transport.send_screen(target, screen).await?;
    }
    Ok(())
}

async fn process<T: ChatTransport>(transport: Arc<T>, router: Arc<ActionRouter>, event: InboundEvent) {
    let reply = handle_event(&router, &event).await;
    if let Err(err) = deliver(transport.as_ref(), event.target(), &reply).await {
        error!(
            chat_id = %event.target().chat_id,
            user_id = %event.user_id(),
            error = %err,
            "failed to deliver reply"
        );
    }
}

/// Polls `transport` until `shutdown` resolves. Events of one batch are
/// handled concurrently, each in its own task. On shutdown, tasks still in
/// flight get [`SHUTDOWN_GRACE`] to deliver their replies before they are
/// aborted.
pub async fn serve<T, F>(transport: Arc<T>, router: Arc<ActionRouter>, shutdown: F)
where
    T: ChatTransport,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut in_flight = JoinSet::new();
    info!("bot service started");
    loop {
        while let Some(result) = in_flight.try_join_next() {
            log_task_exit(result);
        }

        let batch = tokio::select! {
            _ = &mut shutdown => break,
            batch = transport.receive() => batch,
        };

        match batch {
            Ok(events) => {
                for event in events {
                    in_flight.spawn(process(transport.clone(), router.clone(), event));
                }
            }
            Err(err) => {
                warn!(error = %err, "polling chat transport failed; backing off");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                }
            }
        }
    }

    if !in_flight.is_empty() {
        info!(pending = in_flight.len(), "waiting for in-flight replies");
        let drain = async {
            while let Some(result) = in_flight.join_next().await {
                log_task_exit(result);
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!(abandoned = in_flight.len(), "shutdown grace elapsed; aborting replies");
            in_flight.abort_all();
        }
    }
    info!("bot service stopped");
}

fn log_task_exit(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            error!(error = %err, "event task panicked");
        }
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
