use crate::annotations::{ImageRecord, PixelBox};
use crate::brands::BrandSet;
use crate::crop::CropWriter;
use crate::error::Error;
use crate::progress::{ProgressReporter, SilentReporter};
use tracing::{debug, warn};

/// How points are matched to boxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Points whose label is a known brand, strictly inside a box.
    Filtered(BrandSet),
    /// No point correlation: every box of every image is cropped.
    AllBoxes,
    /// Every point, inside or on the edge of a box.
    AllPoints,
}

impl MatchPolicy {
    /// A brand list selects filtered mode; without one `process_by_brands` picks the fallback.
    pub fn select(brands: Option<BrandSet>, process_by_brands: bool) -> Self {
        match brands {
            Some(brands) => MatchPolicy::Filtered(brands),
            None if process_by_brands => MatchPolicy::AllBoxes,
            None => MatchPolicy::AllPoints,
        }
    }

    /// True when no brand filter was applied.
    pub fn cover_all(&self) -> bool {
        !matches!(self, MatchPolicy::Filtered(_))
    }
}

#[derive(Debug)]
pub struct Correlation {
    /// Records with at least one match, in input order.
    pub images: Vec<ImageRecord>,
    pub cover_all: bool,
    pub images_scanned: usize,
    pub crops_written: usize,
}

pub struct Correlator<'a> {
    writer: &'a CropWriter,
    policy: MatchPolicy,
}

impl<'a> Correlator<'a> {
    pub fn new(writer: &'a CropWriter, policy: MatchPolicy) -> Self {
        Self { writer, policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn correlate(&self, records: Vec<ImageRecord>) -> Result<Correlation, Error> {
        self.correlate_with_progress(records, &SilentReporter)
    }

    /// Match points to boxes, crop every match, and keep the images that matched.
    ///
    /// A box hit by several points is cropped once per hit: the last point's
    /// label wins and every earlier crop stays on disk. A source image that
    /// cannot be opened aborts the whole run.
    pub fn correlate_with_progress(
        &self,
        mut records: Vec<ImageRecord>,
        reporter: &dyn ProgressReporter,
    ) -> Result<Correlation, Error> {
        let total = records.len();
        let mut crops_written = 0usize;

        for (index, image) in records.iter_mut().enumerate() {
            let crops = match &self.policy {
                MatchPolicy::AllBoxes => self.crop_all_boxes(image)?,
                MatchPolicy::Filtered(brands) => self.match_points(
                    image,
                    |label| brands.contains(label),
                    PixelBox::contains_strict,
                )?,
                MatchPolicy::AllPoints => {
                    self.match_points(image, |_| true, PixelBox::contains_inclusive)?
                }
            };

            image.matched = crops > 0;
            if image.matched && !self.policy.cover_all() {
                image.retain_reportable_boxes();
            }
            crops_written += crops;
            reporter.on_correlate_progress(index + 1, total);
        }

        records.retain(|image| image.matched);
        debug!(
            "{} of {} images matched, {} crops written",
            records.len(),
            total,
            crops_written
        );

        Ok(Correlation {
            images: records,
            cover_all: self.policy.cover_all(),
            images_scanned: total,
            crops_written,
        })
    }

    fn crop_all_boxes(&self, image: &mut ImageRecord) -> Result<usize, Error> {
        let name = image.name().to_string();
        let mut crops = 0;
        for (index, record) in image.boxes.iter_mut().enumerate() {
            let Some(bbox) = record.bbox() else {
                warn!("Skipping box {} of {}: missing or invalid coordinates", index, name);
                continue;
            };
            let destination = self.writer.write_crop(&name, bbox)?;
            record.cropped_name = file_name_of(&destination);
            crops += 1;
        }
        Ok(crops)
    }

    fn match_points(
        &self,
        image: &mut ImageRecord,
        accepts_label: impl Fn(&str) -> bool,
        contains: fn(&PixelBox, i64, i64) -> bool,
    ) -> Result<usize, Error> {
        let name = image.name().to_string();

        let bounds: Vec<Option<PixelBox>> = image
            .boxes
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let bbox = record.bbox();
                if bbox.is_none() {
                    warn!("Skipping box {} of {}: missing or invalid coordinates", index, name);
                }
                bbox
            })
            .collect();

        let mut crops = 0;
        for point in &image.points {
            let Some((x, y)) = point.coords() else {
                warn!(
                    "Skipping point '{}' of {}: expected a single x,y pair",
                    point.points, name
                );
                continue;
            };
            if !accepts_label(&point.label) {
                continue;
            }

            for (record, bbox) in image.boxes.iter_mut().zip(&bounds) {
                let Some(bbox) = bbox else { continue };
                if !contains(bbox, x, y) {
                    continue;
                }
                record.assign_point(&point.label, x, y);
                let destination = self.writer.write_crop(&name, *bbox)?;
                record.cropped_name = file_name_of(&destination);
                crops += 1;
            }
        }
        Ok(crops)
    }
}

fn file_name_of(path: &std::path::Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
