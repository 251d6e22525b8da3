//! Progress-callback trait for per-sentence events.
//!
//! Inject an [`Arc<dyn ExplainProgressCallback>`] via
//! [`crate::config::ExplainConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the located sentences.
//!
//! # Example
//!
//! ```rust
//! use pdf_explain::{ExplainConfig, ExplainProgressCallback, LocatedSentence};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     hits: AtomicUsize,
//! }
//!
//! impl ExplainProgressCallback for CountingCallback {
//!     fn on_sentence_complete(&self, _sentence: &LocatedSentence, cached: bool) {
//!         if cached {
//!             self.hits.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = ExplainConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { hits: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::model::LocatedSentence;
use std::sync::Arc;

/// Called by the pipeline as it explains each sentence.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the
/// per-sentence methods may be called from several tasks at once. All
/// methods default to no-ops.
pub trait ExplainProgressCallback: Send + Sync {
    /// Called once after segmentation, before any sentence is explained.
    fn on_run_start(&self, total_sentences: usize) {
        let _ = total_sentences;
    }

    /// Called before the cache lookup for a sentence.
    fn on_sentence_start(&self, sentence: &LocatedSentence) {
        let _ = sentence;
    }

    /// Called when a sentence has an explanation.
    ///
    /// `cached` is true when no model call was made.
    fn on_sentence_complete(&self, sentence: &LocatedSentence, cached: bool) {
        let _ = (sentence, cached);
    }

    /// Called when a sentence could not be explained.
    fn on_sentence_error(&self, sentence: &LocatedSentence, error: &str) {
        let _ = (sentence, error);
    }

    /// Called once after every sentence has been attempted.
    fn on_run_complete(&self, total_sentences: usize, failed: usize) {
        let _ = (total_sentences, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExplainProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExplainConfig`].
pub type ProgressCallback = Arc<dyn ExplainProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        cached: AtomicUsize,
        fresh: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExplainProgressCallback for TrackingCallback {
        fn on_sentence_start(&self, _sentence: &LocatedSentence) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_sentence_complete(&self, _sentence: &LocatedSentence, cached: bool) {
            if cached {
                self.cached.fetch_add(1, Ordering::SeqCst);
            } else {
                self.fresh.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_sentence_error(&self, _sentence: &LocatedSentence, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn located(n: usize) -> LocatedSentence {
        LocatedSentence {
            page_number: 0,
            paragraph_number: 0,
            sentence_number: n,
            sentence: format!("Satz {n}."),
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_sentence_start(&located(0));
        cb.on_sentence_complete(&located(0), true);
        cb.on_sentence_error(&located(1), "boom");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_sentence_start(&located(0));
        tracker.on_sentence_complete(&located(0), true);
        tracker.on_sentence_start(&located(1));
        tracker.on_sentence_complete(&located(1), false);
        tracker.on_sentence_start(&located(2));
        tracker.on_sentence_error(&located(2), "invalid JSON");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.cached.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.fresh.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ExplainProgressCallback>();
    }
}
