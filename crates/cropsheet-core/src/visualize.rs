//! Annotated review images: boxes and points drawn over the upright source.

use crate::annotations::ImageRecord;
use crate::config::VisualizerConfig;
use crate::crop::{flat_file_name, open_oriented, save_image};
use crate::error::Error;
use crate::progress::ProgressReporter;
use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const POINT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

pub struct Visualizer {
    font: Option<FontArc>,
    options: VisualizerConfig,
}

impl Visualizer {
    /// Labels use `font_path` when it loads, the bundled DejaVu Sans Mono otherwise.
    pub fn new(options: &VisualizerConfig) -> Self {
        let font = options
            .font_path
            .as_deref()
            .and_then(load_font_file)
            .or_else(|| match FontArc::try_from_slice(BUNDLED_FONT) {
                Ok(font) => Some(font),
                Err(err) => {
                    warn!("Bundled font is unusable: {}; labels will not be drawn", err);
                    None
                }
            });
        Self {
            font,
            options: options.clone(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw the record's boxes and points on a copy of `image_path` and save it
    /// as `output_dir/output_filename`.
    ///
    /// Boxes and points with missing or non-numeric coordinates are skipped.
    pub fn render(
        &self,
        image_path: &Path,
        record: &ImageRecord,
        output_dir: &Path,
        output_filename: &str,
    ) -> Result<PathBuf, Error> {
        let visualization_error = |message: String| Error::Visualization {
            path: image_path.to_path_buf(),
            message,
        };

        fs::create_dir_all(output_dir).map_err(|e| visualization_error(e.to_string()))?;
        let output_path = output_dir.join(output_filename);

        let mut canvas = open_oriented(image_path)
            .map_err(|e| visualization_error(e.to_string()))?
            .to_rgb8();
        self.draw(&mut canvas, record);

        save_image(&DynamicImage::ImageRgb8(canvas), &output_path)
            .map_err(|e| visualization_error(e.to_string()))?;
        debug!("Annotated image saved as {}", output_path.display());
        Ok(output_path)
    }

    fn draw(&self, canvas: &mut RgbImage, record: &ImageRecord) {
        for annotation in &record.boxes {
            let Some(bbox) = annotation.bbox() else { continue };
            let (x1, y1) = (to_i32(bbox.x1), to_i32(bbox.y1));
            // Outline includes both corner pixels.
            let width = bbox.width() + 1;
            let height = bbox.height() + 1;

            for t in 0..i64::from(self.options.box_thickness) {
                let inner_w = width - 2 * t;
                let inner_h = height - 2 * t;
                if inner_w <= 0 || inner_h <= 0 {
                    break;
                }
                let rect = Rect::at(x1 + t as i32, y1 + t as i32)
                    .of_size(to_u32(inner_w), to_u32(inner_h));
                draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
            }
            self.label(canvas, BOX_COLOR, x1, y1.saturating_sub(10), &annotation.label);
        }

        for point in &record.points {
            let Some((x, y)) = point.coords() else { continue };
            let (x, y) = (to_i32(x), to_i32(y));
            draw_filled_circle_mut(canvas, (x, y), self.options.point_radius, POINT_COLOR);
            self.label(
                canvas,
                POINT_COLOR,
                x.saturating_add(10),
                y.saturating_sub(10),
                &point.label,
            );
        }
    }

    fn label(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        let Some(font) = &self.font else { return };
        if text.is_empty() {
            return;
        }
        draw_text_mut(
            canvas,
            color,
            x,
            y,
            PxScale::from(self.options.font_scale),
            font,
            text,
        );
    }
}

/// Render `annotated_<name>` into `rec_dir` for every record.
///
/// Failures are logged and collected; returns the number rendered and the failures.
pub fn render_all(
    visualizer: &Visualizer,
    records: &[ImageRecord],
    images_dir: &Path,
    rec_dir: &Path,
    reporter: &dyn ProgressReporter,
) -> (usize, Vec<Error>) {
    let start = Instant::now();
    let mut rendered = 0usize;
    let mut failures = Vec::new();

    reporter.on_visualize_start(records.len());
    for (index, record) in records.iter().enumerate() {
        let image_path = images_dir.join(record.name());
        let output_name = flat_file_name("annotated_", record.name());
        match visualizer.render(&image_path, record, rec_dir, &output_name) {
            Ok(_) => rendered += 1,
            Err(err) => {
                warn!("{}", err);
                failures.push(err);
            }
        }
        reporter.on_visualize_progress(index + 1, records.len());
    }
    reporter.on_visualize_complete(rendered, start.elapsed().as_secs_f64());

    (rendered, failures)
}

fn load_font_file(path: &Path) -> Option<FontArc> {
    let loaded = fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));
    match loaded {
        Ok(font) => Some(font),
        Err(err) => {
            warn!(
                "Unable to load font {}: {}; using the bundled font",
                path.display(),
                err
            );
            None
        }
    }
}

fn to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn to_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}
