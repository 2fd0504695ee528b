//! FIFO URL frontier shared across a job's workers.
//!
//! A single `Mutex<VecDeque<_>>` guards the coherent view (queue order plus
//! the seen-set), per the "smallest mutex that protects a coherent view"
//! resource-model note; no lock is ever held across a fetch or a storage
//! call. `in_flight` lets workers agree the frontier is exhausted even
//! while it is briefly empty because another worker is still discovering
//! links from a page it's processing.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Mutex;

pub struct WorkQueue {
    queue: Mutex<VecDeque<(String, i32)>>,
    seen: Mutex<HashSet<String>>,
    in_flight: AtomicI64,
    pages_admitted: AtomicI64,
}

impl WorkQueue {
    pub fn new(start_urls: impl IntoIterator<Item = String>) -> Self {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        for url in start_urls {
            if seen.insert(url.clone()) {
                queue.push_back((url, 0));
            }
        }
        Self {
            queue: Mutex::new(queue),
            seen: Mutex::new(seen),
            in_flight: AtomicI64::new(0),
            pages_admitted: AtomicI64::new(0),
        }
    }

    /// Pop the next URL in FIFO order, or `None` if the frontier is
    /// currently empty (which may be transient: call `is_exhausted` to tell
    /// empty-for-now from empty-forever).
    pub async fn pop(&self) -> Option<(String, i32)> {
        let mut queue = self.queue.lock().await;
        let popped = queue.pop_front();
        if popped.is_some() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        popped
    }

    pub fn mark_done(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// `true` once the queue is empty and no worker is mid-page, meaning no
    /// further links can possibly be discovered.
    pub async fn is_exhausted(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && self.queue.lock().await.is_empty()
    }

    /// Enqueue a link discovered while processing a page at `from_depth`,
    /// deduplicating against every URL ever seen (queued, in-flight, or
    /// already processed) in this job.
    pub async fn enqueue_child(&self, url: String, from_depth: i32) {
        let mut seen = self.seen.lock().await;
        if !seen.insert(url.clone()) {
            return;
        }
        drop(seen);
        self.queue.lock().await.push_back((url, from_depth + 1));
    }

    /// Count this page against the job's `max_pages` cap. Returns `false`
    /// once the cap is reached, so the caller can stop admitting new pages
    /// without discarding the one it already popped.
    pub fn admit_page(&self, max_pages: Option<i32>) -> bool {
        let admitted = self.pages_admitted.fetch_add(1, Ordering::SeqCst) + 1;
        match max_pages {
            Some(cap) => admitted <= cap as i64,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_preserved() {
        let q = WorkQueue::new(["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(q.pop().await.unwrap().0, "a");
        assert_eq!(q.pop().await.unwrap().0, "b");
        assert_eq!(q.pop().await.unwrap().0, "c");
        assert!(q.pop().await.is_none());
    }

    #[tokio::test]
    async fn duplicate_start_urls_collapse() {
        let q = WorkQueue::new(["a".to_string(), "a".to_string()]);
        assert_eq!(q.pop().await.unwrap().0, "a");
        assert!(q.pop().await.is_none());
    }

    #[tokio::test]
    async fn enqueue_child_skips_already_seen() {
        let q = WorkQueue::new(["a".to_string()]);
        q.pop().await;
        q.enqueue_child("a".to_string(), 0).await;
        assert!(q.pop().await.is_none());
    }

    #[tokio::test]
    async fn exhausted_only_when_empty_and_idle() {
        let q = WorkQueue::new(["a".to_string()]);
        assert!(!q.is_exhausted().await);
        let (_, _) = q.pop().await.unwrap();
        assert!(!q.is_exhausted().await, "in-flight page still outstanding");
        q.mark_done();
        assert!(q.is_exhausted().await);
    }

    #[test]
    fn max_pages_cap_enforced() {
        let q = WorkQueue::new(Vec::<String>::new());
        assert!(q.admit_page(Some(2)));
        assert!(q.admit_page(Some(2)));
        assert!(!q.admit_page(Some(2)));
    }
}
