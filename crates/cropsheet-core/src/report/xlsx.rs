use super::{build_layout, pixels_to_width_units, scaled_size, ReportCell};
use crate::annotations::ImageRecord;
use crate::config::{
    AppConfig, ReportConfig, VisualizerConfig, FIXED_COLUMNS, IMAGE_NAME_COLUMN, LABEL_COLUMN,
};
use crate::error::Error;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::visualize::{render_all, Visualizer};
use rust_xlsxwriter::{Image, Workbook, Worksheet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Writes the crop report workbook, optionally rendering review images alongside.
pub struct ReportBuilder {
    config: ReportConfig,
    visualizer_config: VisualizerConfig,
    images_dir: PathBuf,
    cropped_dir: PathBuf,
    rec_dir: PathBuf,
    output_path: PathBuf,
}

#[derive(Debug)]
pub struct ReportSummary {
    pub output_path: PathBuf,
    pub rows: usize,
    pub photo_columns: usize,
    pub images_embedded: usize,
    /// Cells left without a thumbnail.
    pub embed_failures: Vec<Error>,
    pub annotated: usize,
    pub visualization_failures: Vec<Error>,
}

impl ReportBuilder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.report.clone(),
            visualizer_config: config.visualizer.clone(),
            images_dir: config.images_dir(),
            cropped_dir: config.cropped_dir(),
            rec_dir: config.rec_dir(),
            output_path: config.output_path(),
        }
    }

    pub fn build(
        &self,
        records: &[ImageRecord],
        cover_all: bool,
        visualize: bool,
    ) -> Result<ReportSummary, Error> {
        self.build_with_progress(records, cover_all, visualize, &SilentReporter)
    }

    /// Lay out, embed, optionally visualize, and save the workbook.
    ///
    /// `records` is only read. A crop that cannot be embedded or an image that
    /// cannot be visualized is logged and collected on the summary; failing to
    /// save the workbook is an error.
    pub fn build_with_progress(
        &self,
        records: &[ImageRecord],
        cover_all: bool,
        visualize: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<ReportSummary, Error> {
        let start = Instant::now();
        let layout = build_layout(records, &self.cropped_dir, &self.config);
        debug!(
            "Report layout: {} rows, {} photo columns, cover_all = {}",
            layout.rows.len(),
            layout.max_crops,
            cover_all
        );
        reporter.on_report_start(layout.rows.len());

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, header) in layout.headers.iter().enumerate() {
            worksheet.write_string(0, col_num(col), header)?;
        }

        let mut embed_failures = Vec::new();
        let mut images_embedded = 0usize;
        let mut photo_widths = vec![0u32; layout.max_crops];

        for (index, row) in layout.rows.iter().enumerate() {
            let row_num = row_num(index + 1);
            let mut tallest = 0u32;

            for (col, cell) in row.cells().into_iter().enumerate() {
                match cell {
                    ReportCell::Text(text) => {
                        worksheet.write_string(row_num, col_num(col), text)?;
                    }
                    ReportCell::Count(count) => {
                        worksheet.write_number(row_num, col_num(col), count as f64)?;
                    }
                    ReportCell::Blank => {}
                    ReportCell::Crop(path) => {
                        match self.embed(worksheet, row_num, col_num(col), path) {
                            Ok((width, height)) => {
                                images_embedded += 1;
                                tallest = tallest.max(height);
                                if let Some(max) = photo_widths.get_mut(col - FIXED_COLUMNS) {
                                    *max = (*max).max(width);
                                }
                            }
                            Err(err) => {
                                warn!("{}; leaving cell empty", err);
                                embed_failures.push(err);
                            }
                        }
                    }
                }
            }

            if tallest > 0 {
                let height = f64::from(tallest) * self.config.row_height_coef;
                worksheet.set_row_height(row_num, height)?;
            }
            reporter.on_report_progress(index + 1, layout.rows.len());
        }

        let (annotated, visualization_failures) = if visualize {
            self.visualize_all(records, reporter)
        } else {
            (0, Vec::new())
        };

        self.size_columns(worksheet, &photo_widths)?;

        workbook.save(&self.output_path)?;
        info!(
            "Report saved to {} ({} rows, {} images)",
            self.output_path.display(),
            layout.rows.len(),
            images_embedded
        );
        reporter.on_report_complete(layout.rows.len(), start.elapsed().as_secs_f64());

        Ok(ReportSummary {
            output_path: self.output_path.clone(),
            rows: layout.rows.len(),
            photo_columns: layout.max_crops,
            images_embedded,
            embed_failures,
            annotated,
            visualization_failures,
        })
    }

    /// Insert a scaled thumbnail at (row, col). Returns its display size in pixels.
    fn embed(
        &self,
        worksheet: &mut Worksheet,
        row: u32,
        col: u16,
        path: &Path,
    ) -> Result<(u32, u32), Error> {
        let embed_error = |message: String| Error::Embed {
            path: path.to_path_buf(),
            message,
        };

        if !path.exists() {
            return Err(embed_error("file not found".to_string()));
        }

        let (width, height) =
            image::image_dimensions(path).map_err(|e| embed_error(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(embed_error("image has no pixels".to_string()));
        }
        let (display_w, display_h) = scaled_size(width, height, self.config.img_max_width);

        let image = Image::new(path)
            .map_err(|e| embed_error(e.to_string()))?
            .set_scale_width(f64::from(display_w) / f64::from(width))
            .set_scale_height(f64::from(display_h) / f64::from(height));
        worksheet
            .insert_image(row, col, &image)
            .map_err(|e| embed_error(e.to_string()))?;

        Ok((display_w, display_h))
    }

    fn visualize_all(
        &self,
        records: &[ImageRecord],
        reporter: &dyn ProgressReporter,
    ) -> (usize, Vec<Error>) {
        let visualizer = Visualizer::new(&self.visualizer_config);
        render_all(&visualizer, records, &self.images_dir, &self.rec_dir, reporter)
    }

    fn size_columns(&self, worksheet: &mut Worksheet, photo_widths: &[u32]) -> Result<(), Error> {
        for (offset, &width) in photo_widths.iter().enumerate() {
            if width > 0 {
                worksheet.set_column_width(
                    col_num(FIXED_COLUMNS + offset),
                    pixels_to_width_units(width, self.config.pixels_to_width_divider),
                )?;
            }
        }
        worksheet.set_column_width(col_num(LABEL_COLUMN), self.config.label_column_width)?;
        worksheet.set_column_width(col_num(IMAGE_NAME_COLUMN), self.config.name_column_width)?;
        Ok(())
    }
}

/// Out-of-range indices saturate so the writer reports its own limit error.
fn col_num(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

fn row_num(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
