//! In-memory form of a CVAT image annotation export.
//!
//! Attribute maps are kept verbatim; coordinates are parsed on demand so a
//! malformed box or point can be skipped by whichever stage meets it.

pub mod parser;

use std::collections::BTreeMap;

pub use parser::{parse_annotations, parse_annotations_str};

pub type Attributes = BTreeMap<String, String>;

pub const IGNORE_LABEL: &str = "ignore";

/// Case-insensitive check for the placeholder label excluded from reporting.
pub fn is_ignore_label(label: &str) -> bool {
    label.eq_ignore_ascii_case(IGNORE_LABEL)
}

/// Parse a CVAT coordinate and truncate it toward zero to a whole pixel.
pub fn parse_coord(raw: &str) -> Option<i64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then(|| value.trunc() as i64)
}

/// Integer pixel rectangle: top-left (x1, y1), bottom-right (x2, y2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl PixelBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Point lies strictly inside; edges do not count.
    pub fn contains_strict(&self, x: i64, y: i64) -> bool {
        self.x1 < x && x < self.x2 && self.y1 < y && y < self.y2
    }

    /// Point lies inside or on an edge.
    pub fn contains_inclusive(&self, x: i64, y: i64) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }
}

/// One `<image>` element with its boxes and points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRecord {
    pub attributes: Attributes,
    pub boxes: Vec<BoxRecord>,
    pub points: Vec<PointRecord>,
    /// Set by the correlator when at least one box was matched and cropped.
    pub matched: bool,
}

impl ImageRecord {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        self.attributes.get("id").map(String::as_str).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.attributes.get("name").map(String::as_str).unwrap_or_default()
    }

    pub fn retain_reportable_boxes(&mut self) {
        self.boxes.retain(|b| !b.is_ignored());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxRecord {
    pub attributes: Attributes,
    /// Starts as the exported label; overwritten by each matching point.
    pub label: String,
    pub x: Option<i64>,
    pub y: Option<i64>,
    /// Basename of the most recent crop written for this box.
    pub cropped_name: Option<String>,
}

impl BoxRecord {
    pub fn from_attributes(attributes: Attributes) -> Self {
        let label = attributes.get("label").cloned().unwrap_or_default();
        Self {
            attributes,
            label,
            ..Self::default()
        }
    }

    /// Pixel bounds, or `None` when any corner is missing or non-numeric.
    pub fn bbox(&self) -> Option<PixelBox> {
        let coord = |key: &str| self.attributes.get(key).and_then(|v| parse_coord(v));
        Some(PixelBox::new(
            coord("xtl")?,
            coord("ytl")?,
            coord("xbr")?,
            coord("ybr")?,
        ))
    }

    pub fn is_ignored(&self) -> bool {
        is_ignore_label(&self.label)
    }

    pub fn assign_point(&mut self, label: &str, x: i64, y: i64) {
        self.label = label.to_string();
        self.x = Some(x);
        self.y = Some(y);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointRecord {
    pub attributes: Attributes,
    /// Raw `"x,y"` attribute.
    pub points: String,
    pub label: String,
}

impl PointRecord {
    pub fn from_attributes(attributes: Attributes) -> Self {
        let points = attributes.get("points").cloned().unwrap_or_default();
        let label = attributes.get("label").cloned().unwrap_or_default();
        Self {
            attributes,
            points,
            label,
        }
    }

    /// The single `x,y` pair, or `None` if the attribute holds anything else.
    pub fn coords(&self) -> Option<(i64, i64)> {
        let mut parts = self.points.split(',');
        let x = parse_coord(parts.next()?)?;
        let y = parse_coord(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some((x, y))
    }
}

/// Finalize records after reporting: drop `ignore` boxes and discard points.
pub fn compact_records(records: &mut [ImageRecord]) {
    for record in records.iter_mut() {
        record.retain_reportable_boxes();
        record.points = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_coord_truncates_toward_zero() {
        assert_eq!(parse_coord("10.9"), Some(10));
        assert_eq!(parse_coord(" 3 "), Some(3));
        assert_eq!(parse_coord("-0.7"), Some(0));
        assert_eq!(parse_coord("abc"), None);
        assert_eq!(parse_coord("NaN"), None);
    }

    #[test]
    fn test_box_boundary_semantics() {
        let b = PixelBox::new(0, 0, 10, 10);
        assert!(!b.contains_strict(0, 5));
        assert!(b.contains_inclusive(0, 5));
        assert!(b.contains_strict(5, 5));
        assert!(!b.contains_inclusive(11, 5));
    }

    #[test]
    fn test_box_bbox_requires_all_corners() {
        let full = BoxRecord::from_attributes(attrs(&[
            ("label", "car"),
            ("xtl", "10.5"),
            ("ytl", "20"),
            ("xbr", "50.99"),
            ("ybr", "60"),
        ]));
        assert_eq!(full.bbox(), Some(PixelBox::new(10, 20, 50, 60)));
        assert_eq!(full.label, "car");

        let partial = BoxRecord::from_attributes(attrs(&[("xtl", "1"), ("ytl", "2")]));
        assert_eq!(partial.bbox(), None);
        assert_eq!(partial.label, "");
    }

    #[test]
    fn test_point_coords_single_pair_only() {
        let ok = PointRecord::from_attributes(attrs(&[("points", "20.7,30.2"), ("label", "x")]));
        assert_eq!(ok.coords(), Some((20, 30)));

        let multi = PointRecord::from_attributes(attrs(&[("points", "1,2;3,4")]));
        assert_eq!(multi.coords(), None);

        let three = PointRecord::from_attributes(attrs(&[("points", "1,2,3")]));
        assert_eq!(three.coords(), None);
    }

    #[test]
    fn test_ignore_label_any_case() {
        assert!(is_ignore_label("ignore"));
        assert!(is_ignore_label("IGNORE"));
        assert!(is_ignore_label("Ignore"));
        assert!(!is_ignore_label("ignored"));
    }

    #[test]
    fn test_compact_records_drops_ignore_and_points() {
        let mut record = ImageRecord::new(attrs(&[("id", "0"), ("name", "a.jpg")]));
        record
            .boxes
            .push(BoxRecord::from_attributes(attrs(&[("label", "Ignore")])));
        record
            .boxes
            .push(BoxRecord::from_attributes(attrs(&[("label", "toyota")])));
        record
            .points
            .push(PointRecord::from_attributes(attrs(&[("points", "1,1")])));

        let mut records = vec![record];
        compact_records(&mut records);

        assert_eq!(records[0].boxes.len(), 1);
        assert_eq!(records[0].boxes[0].label, "toyota");
        assert!(records[0].points.is_empty());
    }
}
