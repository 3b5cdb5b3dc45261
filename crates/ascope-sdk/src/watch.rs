use ascope_monitor::{MonitorEvent, SessionMonitor, WatcherGuard};
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;

/// Async view over a running [`SessionMonitor`]. Bridges the monitor's
/// blocking `std::sync::mpsc` channel onto a Tokio channel via a dedicated
/// forwarding thread, so callers in an async context can `.next().await`
/// instead of polling a blocking receiver.
pub struct LiveStream {
    _guard: WatcherGuard,
    rx: UnboundedReceiver<MonitorEvent>,
}

impl LiveStream {
    pub(crate) fn new(monitor: SessionMonitor) -> Self {
        let (guard, std_rx) = monitor.into_parts();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("monitor-event-bridge".to_string())
            .spawn(move || {
                while let Ok(event) = std_rx.recv() {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .expect("failed to spawn monitor event bridge thread");

        Self { _guard: guard, rx }
    }
}

impl Stream for LiveStream {
    type Item = MonitorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
