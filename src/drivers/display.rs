use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use crate::drivers::store::{Sample, SampleStore};
use crate::drivers::LinkError;
/// Receives a signal for every sample appended to the sequence.
///
/// Called on the store thread; implementations must not block.
pub trait DisplaySink: Send + Sync {
    fn sample_ready(&self, sample: Sample);
    /// The sequence was emptied for a new session.
    fn session_reset(&self, _session: u64) {}
}
type Waker = Box<dyn Fn() + Send + Sync>;
/// Coalescing notification queue between the store and the display.
///
/// At most one "new data" signal is pending at a time. The consumer then
/// pulls everything it has not seen yet from the store, so merged signals
/// never lose points.
#[derive(Default)]
pub struct DisplayFeed {
    pending: AtomicBool,
    available: AtomicU64,
    waker: OnceLock<Waker>,
}
impl DisplayFeed {
    pub fn new() -> Self {
        Self::default()
    }
    /// Installs the callback run when a signal becomes pending (e.g. a
    /// repaint request). Only the first call has an effect.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        let _ = self.waker.set(Box::new(waker));
    }
    /// Clears and returns the pending flag.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
    /// Length of the sequence as of the latest signal.
    pub fn available(&self) -> u64 {
        self.available.load(Ordering::Acquire)
    }
}
impl DisplayFeed {
    fn signal(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            if let Some(wake) = self.waker.get() {
                wake();
            }
        }
    }
}
impl DisplaySink for DisplayFeed {
    fn sample_ready(&self, sample: Sample) {
        self.available.store(sample.index + 1, Ordering::Release);
        self.signal();
    }
    // 新会话开始时立即清空画面，不必等第一个样本
    fn session_reset(&self, _session: u64) {
        self.available.store(0, Ordering::Release);
        self.signal();
    }
}
/// Rolling set of plot points, kept gap-free and in index order.
pub struct PlotWindow {
    points: VecDeque<[f64; 2]>,
    capacity: usize,
    session: Option<u64>,
    next_index: u64,
}
impl PlotWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            session: None,
            next_index: 0,
        }
    }
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn clear(&mut self) {
        self.points.clear();
        self.session = None;
        self.next_index = 0;
    }
    /// Pulls every sample the window has not seen yet. A session change
    /// restarts the window from index 0. Returns how many points were added.
    pub fn sync(&mut self, store: &SampleStore) -> Result<usize, LinkError> {
        let mut batch = store.since(self.next_index)?;
        if self.session != Some(batch.session) {
            self.clear();
            if batch.samples.first().map(|s| s.index) != Some(0) {
                batch = store.since(0)?;
            }
            self.session = Some(batch.session);
        }
        Ok(self.extend(&batch.samples))
    }
    fn extend(&mut self, samples: &[Sample]) -> usize {
        let mut added = 0;
        let from = self.next_index;
        for sample in samples.iter().filter(|s| s.index >= from) {
            debug_assert_eq!(sample.index, self.next_index, "gap in sample stream");
            if self.points.len() == self.capacity {
                self.points.pop_front();
            }
            self.points.push_back([sample.index as f64, sample.value]);
            self.next_index = sample.index + 1;
            added += 1;
        }
        added
    }
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.points.iter().copied().collect()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    #[test]
    fn feed_coalesces_until_taken() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let feed = DisplayFeed::new();
        let counter = Arc::clone(&wakes);
        feed.set_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        for index in 0..5 {
            feed.sample_ready(Sample { index, value: 1.0 });
        }
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(feed.available(), 5);
        assert!(feed.take_pending());
        assert!(!feed.take_pending());
        feed.sample_ready(Sample { index: 5, value: 1.0 });
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }
    #[test]
    fn new_session_clears_window_before_first_sample() {
        let feed = Arc::new(DisplayFeed::new());
        let store = SampleStore::spawn(Some(Arc::clone(&feed) as Arc<dyn DisplaySink>)).unwrap();
        store.reset(1).unwrap();
        let appender = store.appender(1);
        for v in 0..4 {
            appender.append(f64::from(v));
        }
        let mut window = PlotWindow::with_capacity(10);
        assert_eq!(store.len().unwrap(), 4);
        assert!(feed.take_pending());
        assert_eq!(window.sync(&store).unwrap(), 4);
        assert_eq!(feed.available(), 4);
        store.reset(2).unwrap();
        // len() is served after the reset, so the sink has already been told
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(feed.available(), 0);
        assert!(feed.take_pending());
        assert_eq!(window.sync(&store).unwrap(), 0);
        assert!(window.is_empty());
        assert_eq!(window.next_index(), 0);
    }
    #[test]
    fn window_follows_store_and_resets_on_new_session() {
        let store = SampleStore::spawn(None).unwrap();
        store.reset(1).unwrap();
        let appender = store.appender(1);
        for v in 0..5 {
            appender.append(f64::from(v) * 2.0);
        }
        let mut window = PlotWindow::with_capacity(3);
        assert_eq!(window.sync(&store).unwrap(), 5);
        assert_eq!(window.points(), vec![[2.0, 4.0], [3.0, 6.0], [4.0, 8.0]]);
        assert_eq!(window.next_index(), 5);
        assert_eq!(window.sync(&store).unwrap(), 0);
        store.reset(2).unwrap();
        store.appender(2).append(9.0);
        assert_eq!(window.sync(&store).unwrap(), 1);
        assert_eq!(window.points(), vec![[0.0, 9.0]]);
    }
}
