/// Hooks for reporting pipeline progress.
///
/// The CLI implements these with indicatif bars. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    fn on_parse_complete(&self, _images: usize, _duration_secs: f64) {}
    fn on_correlate_start(&self, _images: usize) {}
    fn on_correlate_progress(&self, _images_done: usize, _images_total: usize) {}
    fn on_correlate_complete(&self, _matched_images: usize, _crops: usize, _duration_secs: f64) {}
    fn on_report_start(&self, _rows: usize) {}
    fn on_report_progress(&self, _rows_done: usize, _rows_total: usize) {}
    fn on_report_complete(&self, _rows: usize, _duration_secs: f64) {}
    fn on_visualize_start(&self, _images: usize) {}
    fn on_visualize_progress(&self, _images_done: usize, _images_total: usize) {}
    fn on_visualize_complete(&self, _rendered: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
