//! Live change feed subscriptions.
//!
//! The ledger bumps a [`FeedNotifier`] with the new head offset after every accepted write. [`follow`] turns the
//! change feed into an unbounded stream that pages through whatever is already recorded and then sleeps until the head
//! moves. A poll fallback also picks up events written by other processes sharing the same store.
//!
//! Subscribers own their cursor. A client that reconnects resumes by following again from the offset after the last
//! event it acknowledged, so nothing is skipped and nothing needs to be replayed from the start.
use std::{collections::VecDeque, sync::Arc, time::Duration};

use futures_util::{stream, Stream};
use log::*;
use tokio::sync::watch;

use crate::{db_types::FeedEvent, traits::ChangeFeed, traits::StoreError};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Broadcasts the change feed head offset to live subscribers.
#[derive(Debug, Clone)]
pub struct FeedNotifier {
    sender: Arc<watch::Sender<i64>>,
}

impl Default for FeedNotifier {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FeedNotifier {
    pub fn new(head: i64) -> Self {
        let (sender, _) = watch::channel(head);
        Self { sender: Arc::new(sender) }
    }

    /// Records that events up to `offset` are readable. The head never moves backwards.
    pub fn notify(&self, offset: i64) {
        let moved = self.sender.send_if_modified(|head| {
            if offset > *head {
                *head = offset;
                true
            } else {
                false
            }
        });
        if moved {
            trace!("📬️ Feed head is now at #{offset}");
        }
    }

    pub fn head(&self) -> i64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.sender.subscribe()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FollowOptions {
    pub page_size: usize,
    pub poll_interval: Duration,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

struct Cursor<F> {
    feed: F,
    next: i64,
    head: watch::Receiver<i64>,
    buffer: VecDeque<FeedEvent>,
    options: FollowOptions,
    failed: bool,
}

/// Streams every change feed event with an offset `>= from`, in offset order, forever.
///
/// The stream yields an error and ends if the feed cannot be read. Callers resume by following again from the offset
/// after the last event they received.
pub fn follow<F>(
    feed: F,
    from: i64,
    head: watch::Receiver<i64>,
    options: FollowOptions,
) -> impl Stream<Item = Result<FeedEvent, StoreError>>
where
    F: ChangeFeed + 'static,
{
    let cursor = Cursor { feed, next: from.max(1), head, buffer: VecDeque::new(), options, failed: false };
    stream::unfold(cursor, |mut cursor| async move {
        if cursor.failed {
            return None;
        }
        loop {
            if let Some(event) = cursor.buffer.pop_front() {
                cursor.next = event.offset + 1;
                return Some((Ok(event), cursor));
            }
            // Mark the current head as seen *before* reading, so a write that lands after the read still wakes us
            let _seen = *cursor.head.borrow_and_update();
            match cursor.feed.read_from(cursor.next, cursor.options.page_size).await {
                Ok(events) if !events.is_empty() => {
                    trace!("📬️ Subscriber fetched {} events from #{}", events.len(), cursor.next);
                    cursor.buffer.extend(events);
                    continue;
                },
                Ok(_) => {},
                Err(e) => {
                    warn!("📬️ Subscriber could not read the change feed from #{}. {e}", cursor.next);
                    cursor.failed = true;
                    return Some((Err(e), cursor));
                },
            }
            let poll = cursor.options.poll_interval;
            match tokio::time::timeout(poll, cursor.head.changed()).await {
                Ok(Ok(())) => trace!("📬️ Subscriber woken by a new feed head"),
                // The notifier is gone, so polling is all that is left
                Ok(Err(_)) => tokio::time::sleep(poll).await,
                Err(_) => {},
            }
        }
    })
}
