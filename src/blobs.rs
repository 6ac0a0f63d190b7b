//! Blob URL lifetime tracking.
//!
//! Every stylesheet and media resource of a displayed section lives behind a
//! blob URL. Those URLs must stay alive while their document is on screen
//! and be revoked once a newer document has replaced it.

use std::collections::BTreeMap;

use crate::error::Result;

/// Identifies one render of one page. Later renders get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

/// Mints and revokes object URLs. Implemented by the host.
pub trait BlobStore {
    fn create_object_url(&mut self, bytes: Vec<u8>, mime: &str) -> Result<String>;
    fn revoke_object_url(&mut self, url: &str);
}

/// In-memory [`BlobStore`] minting `blob:basalt/<n>` URLs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    next: u64,
    live: BTreeMap<String, (String, Vec<u8>)>,
    revoked: Vec<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents and MIME type of a live URL.
    pub fn get(&self, url: &str) -> Option<(&str, &[u8])> {
        self.live
            .get(url)
            .map(|(mime, bytes)| (mime.as_str(), bytes.as_slice()))
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Every URL revoked so far, in revocation order.
    pub fn revoked(&self) -> &[String] {
        &self.revoked
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_object_url(&mut self, bytes: Vec<u8>, mime: &str) -> Result<String> {
        let url = format!("blob:basalt/{}", self.next);
        self.next += 1;
        self.live.insert(url.clone(), (mime.to_string(), bytes));
        Ok(url)
    }

    fn revoke_object_url(&mut self, url: &str) {
        if self.live.remove(url).is_some() {
            self.revoked.push(url.to_string());
        } else {
            log::warn!("revoking unknown blob URL {url}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Rendering, or on screen.
    Pending,
    /// Replaced on screen; its URLs may be revoked.
    DoneDisplaying,
}

#[derive(Debug)]
struct TrackedJob {
    state: JobState,
    urls: Vec<String>,
}

/// Blob URLs per render job.
///
/// A job moves from `Pending` to `DoneDisplaying` once a newer job becomes
/// visible, and is forgotten once swept. URLs of the visible job are never
/// revoked and no URL is revoked twice.
#[derive(Debug, Default)]
pub struct BlobTracker {
    jobs: BTreeMap<JobId, TrackedJob>,
}

impl BlobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url` as owned by `job`.
    pub fn track(&mut self, job: JobId, url: impl Into<String>) {
        self.jobs
            .entry(job)
            .or_insert_with(|| TrackedJob {
                state: JobState::Pending,
                urls: Vec::new(),
            })
            .urls
            .push(url.into());
    }

    /// `job` is now on screen: every older job is done displaying.
    ///
    /// Newer jobs are still rendering and stay pending.
    pub fn mark_visible(&mut self, job: JobId) {
        for (_, tracked) in self.jobs.range_mut(..job) {
            tracked.state = JobState::DoneDisplaying;
        }
    }

    /// Mark a single job done, e.g. a render that lost the race to a newer
    /// one and will never be shown.
    pub fn mark_done(&mut self, job: JobId) {
        if let Some(tracked) = self.jobs.get_mut(&job) {
            tracked.state = JobState::DoneDisplaying;
        }
    }

    /// Revoke and forget every job that is done displaying. Returns the
    /// number of URLs revoked.
    pub fn sweep(&mut self, store: &mut dyn BlobStore) -> usize {
        let done: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, tracked)| tracked.state == JobState::DoneDisplaying)
            .map(|(id, _)| *id)
            .collect();

        let mut revoked = 0;
        for id in done {
            if let Some(tracked) = self.jobs.remove(&id) {
                for url in &tracked.urls {
                    store.revoke_object_url(url);
                }
                revoked += tracked.urls.len();
                log::debug!("revoked {} blob URLs of job {}", tracked.urls.len(), id.0);
            }
        }
        revoked
    }

    /// Revoke one job's URLs right away, whatever its state.
    pub fn discard(&mut self, job: JobId, store: &mut dyn BlobStore) {
        if let Some(tracked) = self.jobs.remove(&job) {
            for url in &tracked.urls {
                store.revoke_object_url(url);
            }
        }
    }

    pub fn state(&self, job: JobId) -> Option<JobState> {
        self.jobs.get(&job).map(|tracked| tracked.state)
    }

    pub fn urls(&self, job: JobId) -> &[String] {
        self.jobs
            .get(&job)
            .map(|tracked| tracked.urls.as_slice())
            .unwrap_or_default()
    }

    /// Number of jobs still holding URLs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint(tracker: &mut BlobTracker, store: &mut MemoryBlobStore, job: u64) -> String {
        let url = store.create_object_url(b"x".to_vec(), "text/css").unwrap();
        tracker.track(JobId(job), url.clone());
        url
    }

    #[test]
    fn test_memory_store_mints_distinct_urls() {
        let mut store = MemoryBlobStore::new();
        let a = store.create_object_url(b"a".to_vec(), "text/css").unwrap();
        let b = store.create_object_url(b"b".to_vec(), "image/png").unwrap();
        assert_eq!(a, "blob:basalt/0");
        assert_eq!(b, "blob:basalt/1");
        assert_eq!(store.get(&b), Some(("image/png", &b"b"[..])));
        store.revoke_object_url(&a);
        assert!(!store.is_live(&a));
        assert_eq!(store.revoked(), [a]);
    }

    #[test]
    fn test_visible_job_is_never_revoked() {
        let mut store = MemoryBlobStore::new();
        let mut tracker = BlobTracker::new();
        let first = mint(&mut tracker, &mut store, 1);
        let second = mint(&mut tracker, &mut store, 2);

        tracker.mark_visible(JobId(1));
        assert_eq!(tracker.sweep(&mut store), 0);
        assert!(store.is_live(&first));

        tracker.mark_visible(JobId(2));
        assert_eq!(tracker.state(JobId(1)), Some(JobState::DoneDisplaying));
        assert_eq!(tracker.state(JobId(2)), Some(JobState::Pending));
        assert_eq!(tracker.sweep(&mut store), 1);
        assert!(!store.is_live(&first));
        assert!(store.is_live(&second));

        // Nothing is revoked twice
        assert_eq!(tracker.sweep(&mut store), 0);
        assert_eq!(store.revoked().len(), 1);
    }

    #[test]
    fn test_newer_pending_job_survives() {
        let mut store = MemoryBlobStore::new();
        let mut tracker = BlobTracker::new();
        mint(&mut tracker, &mut store, 1);
        let rendering = mint(&mut tracker, &mut store, 3);

        tracker.mark_visible(JobId(2));
        tracker.sweep(&mut store);
        assert!(store.is_live(&rendering));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_discard_and_mark_done() {
        let mut store = MemoryBlobStore::new();
        let mut tracker = BlobTracker::new();
        let a = mint(&mut tracker, &mut store, 1);
        let b = mint(&mut tracker, &mut store, 2);

        tracker.discard(JobId(2), &mut store);
        assert!(!store.is_live(&b));
        assert!(tracker.urls(JobId(2)).is_empty());

        tracker.mark_done(JobId(1));
        tracker.sweep(&mut store);
        assert!(!store.is_live(&a));
        assert!(tracker.is_empty());
    }
}
