//! Trigger Event Bus (C5) and Data Event Bus (C6).
//!
//! Both buses have the identical shape: insert a value under a key, fan the
//! insertion out to every subscriber as an `entryCreated` notification, and
//! let the value be removed again (self-delete once delivered, or an
//! explicit remove). Rather than two bespoke implementations, both are the
//! same generic `ReplicatedCell` impl instantiated over their own value
//! type -- applying the DESIGN NOTES guidance ("replace untyped map cells
//! with tagged, documented types") one level further than the two tagged
//! cells it describes.

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream_shim::BroadcastStream;

use partition_core::TriggerKey;

use crate::substrate::{BoxStream, ReplicatedCell};
use crate::types::{NotifySample, NotifyTrigger};

/// In-memory replicated cell keyed by `K`. Used directly by the simulated
/// substrate, and is the shape a real substrate's replicated map would be
/// adapted to behind the `ReplicatedCell` trait.
pub struct EventBus<K: Eq + Hash + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static> {
    entries: DashMap<K, V>,
    created_tx: broadcast::Sender<V>,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static> EventBus<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (created_tx, _) = broadcast::channel(capacity.max(1));
        Self { entries: DashMap::new(), created_tx }
    }
}

#[async_trait]
impl<K: Eq + Hash + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static> ReplicatedCell<K, V> for EventBus<K, V> {
    async fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value.clone());
        // No subscribers is a normal steady state (no listener registered
        // yet); the send error is not a fault.
        let _ = self.created_tx.send(value);
    }

    async fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    async fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn subscribe(&self) -> BoxStream<'static, V> {
        Box::pin(BroadcastStream::new(self.created_tx.subscribe()))
    }
}

pub type TriggerBus = EventBus<TriggerKey, NotifyTrigger>;
pub type DataBus = EventBus<u64, NotifySample>;

/// Minimal adapter from `tokio::sync::broadcast::Receiver` to `Stream`,
/// dropping lagged-out items rather than surfacing `RecvError::Lagged` --
/// the at-least-once listener contract (spec §5) tolerates a dropped
/// notification on a slow consumer, it does not require surfacing the gap.
mod tokio_stream_shim {
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use futures_util::Stream;
    use tokio::sync::broadcast::error::RecvError;
    use tokio::sync::broadcast::Receiver;

    pub struct BroadcastStream<T> {
        inner: Receiver<T>,
    }

    impl<T: Clone + Send + 'static> BroadcastStream<T> {
        pub fn new(inner: Receiver<T>) -> Self {
            Self { inner }
        }
    }

    impl<T: Clone + Send + 'static> Stream for BroadcastStream<T> {
        type Item = T;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let fut = self.inner.recv();
            tokio::pin!(fut);
            match fut.poll(cx) {
                Poll::Ready(Ok(value)) => Poll::Ready(Some(value)),
                Poll::Ready(Err(RecvError::Closed)) => Poll::Ready(None),
                Poll::Ready(Err(RecvError::Lagged(_))) => {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
                Poll::Pending => Poll::Pending,
            }
        }
    }
}
