//! Pooled-subscriber stream merge.
//!
//! N independently subscribed streams feed one output channel so a single
//! consumer can parallelize handling while the broker still load-balances
//! deliveries. The aggregate closes as soon as any upstream closes.

use crate::bus::{Delivery, DeliveryStream};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub(crate) fn merge(streams: Vec<DeliveryStream>) -> DeliveryStream {
    let (tx, rx) = mpsc::channel::<Delivery>(DEFAULT_CHANNEL_CAPACITY);
    let (close_tx, close_rx) = watch::channel(false);
    let close_tx = Arc::new(close_tx);

    for mut stream in streams {
        let tx = tx.clone();
        let close_tx = Arc::clone(&close_tx);
        let mut close_rx = close_rx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = close_rx.changed() => break,
                    item = stream.recv() => match item {
                        Some(delivery) => {
                            if tx.send(delivery).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            // One upstream ended: end the aggregate.
            let _ = close_tx.send(true);
        });
    }

    DeliveryStream::new(rx)
}
