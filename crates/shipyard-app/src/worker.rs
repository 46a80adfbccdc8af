//! Queue consumer applying env regeneration requests.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use shipyard_queue::{Message, REGENERATE_APPRC, Subscription};

use crate::app::App;
use crate::error::{AppError, AppResult};
use crate::platform::Platform;

/// Apply one queue message.
///
/// Delivery is at-least-once, so a message for an app that no longer
/// exists is acknowledged rather than failed.
pub fn handle_message(platform: &Platform, msg: &Message) -> AppResult<()> {
    if msg.action != REGENERATE_APPRC {
        return Err(AppError::InvalidMessage(msg.action.clone()));
    }
    let Some(name) = msg.args.first() else {
        return Err(AppError::InvalidMessage(format!(
            "{} requires an app name",
            msg.action
        )));
    };
    match App::get(platform, name) {
        Ok(app) => {
            app.serialize_env_vars(platform)?;
            debug!(app = %name, "apprc regenerated");
            Ok(())
        }
        Err(AppError::NotFound(_)) => {
            warn!(app = %name, "app gone, dropping regenerate request");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Consume `subscription` until it closes or `shutdown` flips to `true`.
///
/// Handlers block on unit commands, so each message runs on the blocking
/// pool. Handler failures are logged and the loop moves on.
pub async fn run_worker(
    platform: Arc<Platform>,
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("worker started");
    loop {
        tokio::select! {
            msg = subscription.recv() => {
                let Some(msg) = msg else {
                    info!("queue closed, worker stopping");
                    break;
                };
                let platform = Arc::clone(&platform);
                let action = msg.action.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || handle_message(&platform, &msg)).await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(%action, error = %err, "message handling failed"),
                    Err(err) => error!(%action, error = %err, "message handler panicked"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("worker shutting down");
                    break;
                }
            }
        }
    }
}
