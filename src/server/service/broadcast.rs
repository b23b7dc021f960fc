use std::time::Duration;

use actix_web::web::Bytes;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::server::model::event::{keepalive_frame, LiveEvent};

/// Fans live events out to every connected display.
///
/// Delivery is fire-and-forget: a subscriber sees only what is published
/// while it is attached, and one that falls more than the channel capacity
/// behind loses the skipped events. Displays backfill with a full fetch.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<LiveEvent>,
    keepalive: Duration,
    shutdown_token: CancellationToken,
}

impl Broadcaster {
    pub fn new(capacity: usize, keepalive: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            // a zero period would panic the interval
            keepalive: keepalive.max(Duration::from_secs(1)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Publish to everyone attached right now; returns how many received it.
    /// Never blocks and never fails the caller.
    pub fn publish(&self, event: LiveEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(n) => {
                debug!("published {} to {} subscriber(s)", name, n);
                n
            }
            Err(_) => {
                debug!("published {} with no subscribers", name);
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let mut keepalive = time::interval_at(time::Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Subscription {
            rx: self.tx.subscribe(),
            keepalive,
            shutdown_token: self.shutdown_token.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// End every open subscription.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }
}

/// One display's view of the event stream.
pub struct Subscription {
    rx: broadcast::Receiver<LiveEvent>,
    keepalive: Interval,
    shutdown_token: CancellationToken,
}

impl Subscription {
    /// Next event, skipping anything lost to lag. Events already queued are
    /// drained before a shutdown ends the subscription.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            tokio::select! {
                biased;
                received = self.rx.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("subscriber lagged, {} event(s) dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.shutdown_token.cancelled() => return None,
            }
        }
    }

    /// Next Server-Sent Events frame: an event or a keep-alive comment.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            tokio::select! {
                biased;
                received = self.rx.recv() => match received {
                    Ok(event) => match event.to_frame() {
                        Ok(frame) => return Some(frame),
                        Err(e) => warn!("failed to encode {}, {}", event.name(), e),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("subscriber lagged, {} event(s) dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.shutdown_token.cancelled() => return None,
                _ = self.keepalive.tick() => return Some(keepalive_frame()),
            }
        }
    }
}
