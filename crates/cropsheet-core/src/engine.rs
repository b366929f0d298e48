use crate::annotations::{compact_records, parse_annotations, ImageRecord};
use crate::brands::load_brands_or_unfiltered;
use crate::config::AppConfig;
use crate::correlate::{Correlator, MatchPolicy};
use crate::crop::CropWriter;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::report::{ReportBuilder, ReportSummary};
use crate::visualize::{render_all, Visualizer};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug)]
pub struct PipelineResult {
    pub parse_duration: Duration,
    pub correlate_duration: Duration,
    pub report_duration: Duration,
    pub images_total: usize,
    pub images_matched: usize,
    pub crops_written: usize,
    pub cover_all: bool,
    pub report: ReportSummary,
    /// Correlated records after the finalize step: no `ignore` boxes, no points.
    pub records: Vec<ImageRecord>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the full annotation-to-report pipeline:
    /// 1. Parse the CVAT export
    /// 2. Recreate `cropped/` and load the brand filter
    /// 3. Correlate points to boxes, cropping every match
    /// 4. Write the report workbook (and review images)
    /// 5. Compact the correlated records
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<PipelineResult, Error> {
        self.config.validate()?;

        // Phase 1: Parse
        let annotations_path = self.config.annotations_path();
        info!("Parsing annotations from {}...", annotations_path.display());
        let parse_start = Instant::now();
        let records = parse_annotations(&annotations_path)?;
        let parse_duration = parse_start.elapsed();
        let images_total = records.len();
        reporter.on_parse_complete(images_total, parse_duration.as_secs_f64());

        // Phase 2: Correlate and crop
        let writer = CropWriter::from_config(&self.config);
        writer.prepare()?;
        let brands = load_brands_or_unfiltered(&self.config.brands_path());
        let policy = MatchPolicy::select(brands, self.config.process_by_brands);
        info!("Correlating points to boxes ({} mode)...", mode_name(&policy));

        let correlate_start = Instant::now();
        reporter.on_correlate_start(images_total);
        let correlation =
            Correlator::new(&writer, policy).correlate_with_progress(records, reporter)?;
        let correlate_duration = correlate_start.elapsed();
        reporter.on_correlate_complete(
            correlation.images.len(),
            correlation.crops_written,
            correlate_duration.as_secs_f64(),
        );
        debug!(
            "Correlation completed in {:.2}s: {} matched images, {} crops",
            correlate_duration.as_secs_f64(),
            correlation.images.len(),
            correlation.crops_written,
        );

        // Phase 3: Report
        info!("Building report...");
        let report_start = Instant::now();
        let report = ReportBuilder::new(&self.config).build_with_progress(
            &correlation.images,
            correlation.cover_all,
            self.config.visualize,
            reporter,
        )?;
        let report_duration = report_start.elapsed();

        // Phase 4: Finalize
        let mut records = correlation.images;
        compact_records(&mut records);

        Ok(PipelineResult {
            parse_duration,
            correlate_duration,
            report_duration,
            images_total,
            images_matched: records.len(),
            crops_written: correlation.crops_written,
            cover_all: correlation.cover_all,
            report,
            records,
        })
    }

    /// Render review images for every record in the export, without cropping.
    pub fn visualize_all(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<(usize, Vec<Error>), Error> {
        let records = parse_annotations(&self.config.annotations_path())?;
        let visualizer = Visualizer::new(&self.config.visualizer);
        Ok(render_all(
            &visualizer,
            &records,
            &self.config.images_dir(),
            &self.config.rec_dir(),
            reporter,
        ))
    }
}

fn mode_name(policy: &MatchPolicy) -> &'static str {
    match policy {
        MatchPolicy::Filtered(_) => "brand filter",
        MatchPolicy::AllBoxes => "all boxes",
        MatchPolicy::AllPoints => "all points",
    }
}
