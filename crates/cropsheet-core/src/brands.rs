use crate::error::Error;
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Lowercase labels a point must carry to be matched in filtered mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandSet {
    labels: HashSet<String>,
}

impl BrandSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|l| l.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive membership.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&label.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Read column A of the first worksheet as brand labels.
///
/// Empty cells are skipped; every other value is stringified and lowercased.
pub fn load_brands(path: &Path) -> Result<BrandSet, Error> {
    let brand_error = |message: String| Error::BrandLoad {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| brand_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| brand_error("workbook has no worksheets".to_string()))?
        .map_err(|e| brand_error(e.to_string()))?;

    let mut labels = Vec::new();
    if let (Some((start_row, start_col)), Some((end_row, _))) = (range.start(), range.end()) {
        // Column A is only present when the used range begins there.
        if start_col == 0 {
            for row in start_row..=end_row {
                match range.get_value((row, 0)) {
                    None | Some(Data::Empty) => {}
                    Some(cell) => {
                        let text = cell.to_string();
                        if !text.is_empty() {
                            labels.push(text);
                        }
                    }
                }
            }
        }
    }

    let brands = BrandSet::new(labels);
    info!("Loaded {} brands from {}", brands.len(), path.display());
    Ok(brands)
}

/// Load brands, degrading to `None` (unfiltered mode) when the workbook cannot be read.
pub fn load_brands_or_unfiltered(path: &Path) -> Option<BrandSet> {
    match load_brands(path) {
        Ok(brands) => Some(brands),
        Err(err) => {
            warn!("{}; processing without brand filter", err);
            None
        }
    }
}
