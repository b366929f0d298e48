use cropsheet_core::ProgressReporter;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const PHASE_COUNT: usize = 3;

#[derive(Debug, Copy, Clone)]
enum Phase {
    Correlate,
    Report,
    Visualize,
}

impl Phase {
    fn to_index(self) -> usize {
        match self {
            Phase::Correlate => 0,
            Phase::Report => 1,
            Phase::Visualize => 2,
        }
    }
}

/// CLI progress reporter using indicatif progress bars.
///
/// Each phase owns its bar. Review images are rendered while the report is
/// still open, so the report bar stays up underneath the annotation bar.
pub struct CliReporter {
    multi: MultiProgress,
    bars: Mutex<[Option<ProgressBar>; PHASE_COUNT]>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self::with_multi(MultiProgress::new())
    }

    fn with_multi(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Mutex::new([None, None, None]),
        }
    }

    fn start_bar(&self, phase: Phase, total: usize, template: &str) {
        let pb = self.multi.add(ProgressBar::new(total as u64));
        if let Ok(style) = ProgressStyle::with_template(template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut bars) = self.bars.lock() {
            if let Some(old) = bars[phase.to_index()].replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn set_position(&self, phase: Phase, position: usize) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(pb) = &bars[phase.to_index()] {
                pb.set_position(position as u64);
            }
        }
    }

    fn finish_bar(&self, phase: Phase) {
        if let Ok(mut bars) = self.bars.lock() {
            if let Some(pb) = bars[phase.to_index()].take() {
                pb.finish_and_clear();
                self.multi.remove(&pb);
            }
        }
    }

    /// Print a line without tearing the bars still on screen.
    fn done(&self, line: String) {
        self.multi.suspend(|| eprintln!("  \x1b[32m✓\x1b[0m {}", line));
    }

    #[cfg(test)]
    fn position(&self, phase: Phase) -> Option<u64> {
        self.bars
            .lock()
            .ok()
            .and_then(|bars| bars[phase.to_index()].as_ref().map(ProgressBar::position))
    }
}

impl ProgressReporter for CliReporter {
    fn on_parse_complete(&self, images: usize, duration_secs: f64) {
        self.done(format!("Parsed {} images in {:.2}s", images, duration_secs));
    }

    fn on_correlate_start(&self, images: usize) {
        self.start_bar(
            Phase::Correlate,
            images,
            "  {spinner:.cyan} Cropping [{bar:30.cyan/dim}] {pos}/{len} images ({eta} remaining)",
        );
    }

    fn on_correlate_progress(&self, images_done: usize, _images_total: usize) {
        self.set_position(Phase::Correlate, images_done);
    }

    fn on_correlate_complete(&self, matched_images: usize, crops: usize, duration_secs: f64) {
        self.finish_bar(Phase::Correlate);
        self.done(format!(
            "Correlation complete: {} crops from {} images in {:.2}s",
            crops, matched_images, duration_secs
        ));
    }

    fn on_report_start(&self, rows: usize) {
        self.start_bar(
            Phase::Report,
            rows,
            "  {spinner:.cyan} Report [{bar:30.cyan/dim}] {pos}/{len} rows",
        );
    }

    fn on_report_progress(&self, rows_done: usize, _rows_total: usize) {
        self.set_position(Phase::Report, rows_done);
    }

    fn on_report_complete(&self, rows: usize, duration_secs: f64) {
        self.finish_bar(Phase::Report);
        self.done(format!("Report complete: {} rows in {:.2}s", rows, duration_secs));
    }

    fn on_visualize_start(&self, images: usize) {
        self.start_bar(
            Phase::Visualize,
            images,
            "  {spinner:.cyan} Annotating [{bar:30.cyan/dim}] {pos}/{len} images",
        );
    }

    fn on_visualize_progress(&self, images_done: usize, _images_total: usize) {
        self.set_position(Phase::Visualize, images_done);
    }

    fn on_visualize_complete(&self, rendered: usize, duration_secs: f64) {
        self.finish_bar(Phase::Visualize);
        self.done(format!("Annotated {} images in {:.2}s", rendered, duration_secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    fn hidden_reporter() -> CliReporter {
        CliReporter::with_multi(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    #[test]
    fn test_annotation_bar_leaves_report_bar_running() {
        let reporter = hidden_reporter();
        reporter.on_report_start(4);
        reporter.on_report_progress(3, 4);

        reporter.on_visualize_start(2);
        reporter.on_visualize_progress(2, 2);
        assert_eq!(reporter.position(Phase::Report), Some(3));
        assert_eq!(reporter.position(Phase::Visualize), Some(2));

        reporter.on_visualize_complete(2, 0.1);
        assert_eq!(reporter.position(Phase::Visualize), None);
        assert_eq!(reporter.position(Phase::Report), Some(3));

        reporter.on_report_complete(4, 0.2);
        assert_eq!(reporter.position(Phase::Report), None);
    }

    #[test]
    fn test_restarting_a_phase_replaces_its_bar() {
        let reporter = hidden_reporter();
        reporter.on_correlate_start(10);
        reporter.on_correlate_progress(7, 10);
        reporter.on_correlate_start(5);
        assert_eq!(reporter.position(Phase::Correlate), Some(0));
    }
}
