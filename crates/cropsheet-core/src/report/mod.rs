//! Row/column layout of the crop report.
//!
//! Rows group the reportable boxes of one image by label and list the crops
//! written for them. The workbook itself is produced by [`xlsx::ReportBuilder`].

pub mod xlsx;

use crate::annotations::{BoxRecord, ImageRecord};
use crate::config::{ReportConfig, FIXED_COLUMNS};
use crate::error::Error;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use xlsx::{ReportBuilder, ReportSummary};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub image_id: String,
    pub image_name: String,
    /// One path per box in the group that produced a crop.
    pub crop_paths: Vec<PathBuf>,
}

/// A single cell of a report row, in column order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportCell<'a> {
    Text(&'a str),
    Count(usize),
    /// Reserved column left for manual entry.
    Blank,
    Crop(&'a Path),
}

impl ReportRow {
    pub fn crop_count(&self) -> usize {
        self.crop_paths.len()
    }

    /// `[label, reference photo, task id, image id, image name, count, crop...]`
    pub fn cells(&self) -> Vec<ReportCell<'_>> {
        let mut cells = Vec::with_capacity(FIXED_COLUMNS + self.crop_paths.len());
        cells.push(ReportCell::Text(&self.label));
        cells.push(ReportCell::Blank);
        cells.push(ReportCell::Blank);
        cells.push(ReportCell::Text(&self.image_id));
        cells.push(ReportCell::Text(&self.image_name));
        cells.push(ReportCell::Count(self.crop_count()));
        cells.extend(self.crop_paths.iter().map(|p| ReportCell::Crop(p.as_path())));
        cells
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub headers: Vec<String>,
    /// Sorted by label, ascending and stable.
    pub rows: Vec<ReportRow>,
    /// Largest crop count of any row; the number of `photoN` columns.
    pub max_crops: usize,
}

/// Lay out report rows from correlated records without modifying them.
///
/// `ignore` boxes are left out; the remaining boxes of each image are grouped
/// by label in order of first appearance before the global sort by label.
pub fn build_layout(
    records: &[ImageRecord],
    cropped_dir: &Path,
    config: &ReportConfig,
) -> ReportLayout {
    let mut rows = Vec::new();
    let mut max_crops = 0;

    for record in records {
        for (label, boxes) in group_by_label(&record.boxes) {
            let crop_paths: Vec<PathBuf> = boxes
                .iter()
                .filter_map(|b| b.cropped_name.as_ref())
                .map(|name| cropped_dir.join(name))
                .collect();
            max_crops = max_crops.max(crop_paths.len());
            rows.push(ReportRow {
                label: label.to_string(),
                image_id: record.id().to_string(),
                image_name: record.name().to_string(),
                crop_paths,
            });
        }
    }

    rows.sort_by(|a, b| a.label.cmp(&b.label));

    let mut headers = config.headers.clone();
    headers.extend((1..=max_crops).map(|n| format!("{}{}", config.photo_header_prefix, n)));

    ReportLayout {
        headers,
        rows,
        max_crops,
    }
}

fn group_by_label(boxes: &[BoxRecord]) -> Vec<(&str, Vec<&BoxRecord>)> {
    let mut groups: Vec<(&str, Vec<&BoxRecord>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in boxes.iter().filter(|b| !b.is_ignored()) {
        let label = record.label.as_str();
        match index.get(label) {
            Some(&i) => groups[i].1.push(record),
            None => {
                index.insert(label, groups.len());
                groups.push((label, vec![record]));
            }
        }
    }
    groups
}

/// Display size capped at `max_width`, keeping aspect ratio. Narrower images are unchanged.
pub fn scaled_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width > max_width {
        let factor = f64::from(max_width) / f64::from(width);
        (max_width, (f64::from(height) * factor) as u32)
    } else {
        (width, height)
    }
}

/// Probe an image's dimensions from its header and cap them at `max_width`.
pub fn image_display_size(path: &Path, max_width: u32) -> Result<(u32, u32), Error> {
    let (width, height) = image::image_dimensions(path)?;
    Ok(scaled_size(width, height, max_width))
}

pub fn pixels_to_width_units(pixels: u32, divider: f64) -> f64 {
    f64::from(pixels) / divider
}
