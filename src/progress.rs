//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the document. Pages are processed strictly in
//! order on one thread, so events for page `n` always precede those for
//! page `n + 1`.
//!
//! # Example
//!
//! ```rust
//! use pdf2epub::{ConversionProgressCallback, ConversionConfig, PageSummary};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     images: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, summary: &PageSummary, _total_pages: usize) {
//!         self.images.fetch_add(summary.embedded_images, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     images: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::PageWarning;
use crate::output::PageSummary;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `Send + Sync` is required because the async entry
/// points move the pipeline onto a blocking thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first page is rendered.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is rendered.
    ///
    /// `page_num` is 1-indexed.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when an embedded image is dropped from a page.
    fn on_image_skipped(&self, warning: &PageWarning) {
        let _ = warning;
    }

    /// Called when a page's blocks have been added to the chapter.
    fn on_page_complete(&self, summary: &PageSummary, total_pages: usize) {
        let _ = (summary, total_pages);
    }

    /// Called once after the package has been serialised.
    fn on_conversion_complete(&self, fullpage_images: usize, embedded_images: usize) {
        let _ = (fullpage_images, embedded_images);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skipped: AtomicUsize,
        embedded_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_skipped(&self, _warning: &PageWarning) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _summary: &PageSummary, _total_pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _fullpage_images: usize, embedded_images: usize) {
            self.embedded_total.store(embedded_images, Ordering::SeqCst);
        }
    }

    fn summary(page_num: usize) -> PageSummary {
        PageSummary {
            page_num,
            word_count: 12,
            below_threshold: true,
            text_blocks: 1,
            embedded_images: 0,
            skipped_images: 0,
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(&summary(1), 2);
        cb.on_conversion_complete(2, 0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2);
        tracker.on_image_skipped(&PageWarning::ImageUndecodable {
            page: 1,
            name: "Im0".into(),
            detail: "truncated".into(),
        });
        tracker.on_page_complete(&summary(1), 2);
        tracker.on_page_start(2, 2);
        tracker.on_page_complete(&summary(2), 2);
        tracker.on_conversion_complete(2, 5);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.embedded_total.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10);
        cb.on_page_start(1, 10);
    }
}
