//! Request/answer layer over a [`DuplexChannel`].
//!
//! A handler registered for `E` receives the `data` of every inbound `E`
//! frame and its outcome goes back on `E:answer`. Exactly one answer is
//! emitted per request, including when the handler fails or panics.
//!
//! Answers are correlated by event name only. Requests of one name are
//! handled one at a time in arrival order, so a peer that waits for each
//! answer before sending the next request always gets its own answer.

use crate::channel::DuplexChannel;
use crate::error::handler::HandlerError;
use crate::wire::{EventEnvelope, answer_event};

use common::ErrorLocation;

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::Arc;

use futures_util::FutureExt;
use log::{debug, error, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

/// Subscribe `handler` to `event` on `channel`.
///
/// The subscription is made before this returns, so it is safe to connect
/// the channel right after. The returned task serves requests until the
/// subscription is removed or the task is aborted.
pub fn register_handler<F, Fut>(
    channel: &Arc<DuplexChannel>,
    event: &str,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let mut requests = channel.on(event);
    let channel = Arc::clone(channel);
    let event = event.to_string();

    tokio::spawn(async move {
        while let Some(inbound) = requests.recv().await {
            let payload = EventEnvelope::request_payload(inbound);
            let envelope = invoke(&event, &handler, payload).await;
            answer(&channel, envelope).await;
        }
        debug!("Handler for '{event}' unsubscribed");
    })
}

/// Run one request through `handler` and build its answer envelope.
pub async fn invoke<F, Fut>(event: &str, handler: &F, payload: Value) -> EventEnvelope
where
    F: Fn(Value) -> Fut,
    Fut: Future<Output = Result<Value, HandlerError>>,
{
    let outcome = AssertUnwindSafe(async { handler(payload).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(HandlerError::Panicked {
                message: panic_message(panic.as_ref()),
                location: ErrorLocation::from(Location::caller()),
            })
        });

    match outcome {
        Ok(data) => EventEnvelope::success(event, data),
        Err(e) => {
            warn!("Handler for '{event}' failed: {e}");
            EventEnvelope::failure(event, e.answer_message())
        }
    }
}

async fn answer(channel: &DuplexChannel, envelope: EventEnvelope) {
    let answer_name = answer_event(envelope.event());

    let data = match serde_json::to_value(&envelope) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to encode answer for '{}': {e}", envelope.event());
            return;
        }
    };

    if let Err(e) = channel.emit(&answer_name, data).await {
        warn!("Answer '{answer_name}' not delivered: {e}");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Handler panicked".to_string())
}
