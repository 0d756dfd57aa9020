//! Request bookkeeping, disposal and the idle auto-dispose watcher.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{sleep, Instant};

use crate::client::{ClientInner, ClientState};
use crate::{HttpError, Result};

/// Marks one request as in flight for as long as it is alive.
pub(crate) struct ActiveRequest<'a> {
    inner: &'a ClientInner,
    id: u64,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.inner.lock_state().active.remove(&self.id);
    }
}

/// Rejects disposed clients, records activity, restarts the idle watcher and
/// registers the request.
pub(crate) fn begin_request(inner: &Arc<ClientInner>) -> Result<ActiveRequest<'_>> {
    let mut state = inner.lock_state();
    if state.disposed {
        return Err(HttpError::Disposed);
    }

    state.last_activity = Instant::now();
    schedule_idle_check(inner, &mut state);

    let id = state.next_request_id;
    state.next_request_id = state.next_request_id.wrapping_add(1);
    state.active.insert(id);

    Ok(ActiveRequest { inner, id })
}

/// Replaces any pending idle check with a fresh one.
pub(crate) fn schedule_idle_check(inner: &Arc<ClientInner>, state: &mut ClientState) {
    let Some(threshold_ms) = inner.config.idle_threshold_ms() else {
        return;
    };
    if let Some(previous) = state.idle_timer.take() {
        previous.abort();
    }

    let Ok(runtime) = Handle::try_current() else {
        #[cfg(feature = "tracing")]
        tracing::warn!("no tokio runtime available, idle auto-dispose is not scheduled");
        return;
    };
    let client = Arc::downgrade(inner);
    state.idle_timer = Some(runtime.spawn(watch_idle(client, Duration::from_millis(threshold_ms))));
}

/// Sleeps for `threshold`, then either disposes the client or checks again.
async fn watch_idle(client: Weak<ClientInner>, threshold: Duration) {
    loop {
        sleep(threshold).await;

        let Some(inner) = client.upgrade() else {
            return;
        };
        match inner.dispose_if_idle(threshold) {
            IdleCheck::Disposed | IdleCheck::AlreadyDisposed => return,
            IdleCheck::Busy => {}
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
enum IdleCheck {
    Disposed,
    AlreadyDisposed,
    Busy,
}

impl ClientInner {
    /// Marks the client disposed, revokes its scope, forgets in-flight
    /// requests and cancels the idle watcher. Returns `false` if it already was.
    pub(crate) fn dispose(&self) -> bool {
        let released = release(&mut self.lock_state());

        #[cfg(feature = "tracing")]
        {
            if released {
                tracing::debug!(base_url = ?self.config.base_url, "client disposed");
            }
        }

        released
    }

    fn dispose_if_idle(&self, threshold: Duration) -> IdleCheck {
        let mut state = self.lock_state();
        if state.disposed {
            return IdleCheck::AlreadyDisposed;
        }
        if state.last_activity.elapsed() < threshold || !state.active.is_empty() {
            return IdleCheck::Busy;
        }
        release(&mut state);
        drop(state);

        #[cfg(feature = "tracing")]
        tracing::info!(
            base_url = ?self.config.base_url,
            idle_ms = threshold.as_millis() as u64,
            "client disposed after idle period"
        );

        IdleCheck::Disposed
    }
}

fn release(state: &mut ClientState) -> bool {
    if state.disposed {
        return false;
    }
    state.disposed = true;
    state.scope.cancel();
    state.active.clear();
    if let Some(timer) = state.idle_timer.take() {
        timer.abort();
    }
    true
}
