//! Stream throttling utilities

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::types::TelemetrySnapshot;

/// Items carrying a monotonically increasing version.
pub trait Versioned {
    fn version(&self) -> u64;
}

impl Versioned for TelemetrySnapshot {
    fn version(&self) -> u64 {
        TelemetrySnapshot::version(self)
    }
}

impl<T: Versioned + ?Sized> Versioned for Arc<T> {
    fn version(&self) -> u64 {
        (**self).version()
    }
}

/// Extension trait to add throttling to any stream of versioned items
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per interval
    ///
    /// Uses "latest-wins" semantics: if multiple items arrive during an
    /// interval, only the latest is emitted. An item whose version matches
    /// the last emitted one is dropped.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
        Self::Item: Versioned,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        last_version: Option<u64>,
        exhausted: bool,
    }
}

impl<S: Stream> Throttle<S> {
    /// Create a new throttled stream
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, last_version: None, exhausted: false }
    }
}

impl<S> Stream for Throttle<S>
where
    S: Stream,
    S::Item: Versioned,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything ready, keeping only the latest
        while !*this.exhausted {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.exhausted = true,
                Poll::Pending => break,
            }
        }

        if this.pending.as_ref().is_some_and(|item| Some(item.version()) == *this.last_version) {
            *this.pending = None;
        }

        if this.pending.is_none() {
            return if *this.exhausted { Poll::Ready(None) } else { Poll::Pending };
        }

        ready!(this.interval.poll_tick(cx));

        let item = this.pending.take();
        *this.last_version = item.as_ref().map(Versioned::version);
        Poll::Ready(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::watch;
    use tokio::time::Instant;
    use tokio_stream::wrappers::WatchStream;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged(u64);

    impl Versioned for Tagged {
        fn version(&self) -> u64 {
            self.0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_only_latest_within_interval() {
        let items = futures::stream::iter((1..=5).map(Tagged));
        let emitted: Vec<_> = items.throttle(Duration::from_millis(100)).collect().await;
        assert_eq!(emitted, vec![Tagged(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_open_while_source_is_idle() {
        let (tx, rx) = watch::channel(Tagged(0));
        let mut throttled = WatchStream::new(rx).throttle(Duration::from_millis(50));

        assert_eq!(throttled.next().await, Some(Tagged(0)));

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.send(Tagged(1)).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(Tagged(2)).unwrap();
            tx
        });

        let start = Instant::now();
        assert_eq!(throttled.next().await, Some(Tagged(1)));
        assert!(start.elapsed() >= Duration::from_millis(500));

        // 2 arrives 10 ms after 1 and waits for the next tick
        assert_eq!(throttled.next().await, Some(Tagged(2)));
        assert!(start.elapsed() >= Duration::from_millis(550));

        drop(sender.await.unwrap());
        assert_eq!(throttled.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_versions_are_not_repeated() {
        let items = futures::stream::iter(vec![Tagged(3), Tagged(3)]).chain(
            futures::stream::once(async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Tagged(3)
            }),
        );
        let emitted: Vec<_> = items.throttle(Duration::from_millis(10)).collect().await;
        assert_eq!(emitted, vec![Tagged(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_throttle_by_version() {
        let snapshot = Arc::new(TelemetrySnapshot::new());
        let emitted: Vec<_> = futures::stream::iter(vec![snapshot.clone(), snapshot])
            .throttle(Duration::from_millis(10))
            .map(|s| s.version())
            .collect()
            .await;
        assert_eq!(emitted, vec![0]);
    }
}
