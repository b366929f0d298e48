use crate::error::Error;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Leading report columns before the `photoN` columns:
/// label, reference photo, task id, image id, image name, crop count.
pub const FIXED_COLUMNS: usize = 6;

pub const LABEL_COLUMN: usize = 0;
pub const IMAGE_NAME_COLUMN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder holding `images/`, `cropped/`, `rec/` and the output workbook.
    pub data_root: PathBuf,
    /// Annotation export, relative to `data_root` unless absolute.
    pub annotations_file: PathBuf,
    /// Brand allow-list workbook, relative to `data_root` unless absolute.
    pub brands_file: PathBuf,
    pub process_by_brands: bool,
    pub visualize: bool,
    pub report: ReportConfig,
    pub visualizer: VisualizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub headers: Vec<String>,
    pub photo_header_prefix: String,
    /// Thumbnails wider than this are scaled down, keeping aspect ratio.
    pub img_max_width: u32,
    /// Row height in points per pixel of the tallest thumbnail.
    pub row_height_coef: f64,
    /// Pixels per spreadsheet column-width unit.
    pub pixels_to_width_divider: f64,
    pub label_column_width: f64,
    pub name_column_width: f64,
    pub output_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// TrueType/OpenType font for label text, overriding the bundled DejaVu Sans Mono.
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
    pub box_thickness: u32,
    pub point_radius: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            annotations_file: PathBuf::from("annotations.xml"),
            brands_file: PathBuf::from("brands.xlsx"),
            process_by_brands: false,
            visualize: true,
            report: ReportConfig::default(),
            visualizer: VisualizerConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            headers: vec![
                "label".to_string(),
                "reference photo".to_string(),
                "task id".to_string(),
                "image id".to_string(),
                "image name".to_string(),
                "crop count".to_string(),
            ],
            photo_header_prefix: "photo".to_string(),
            img_max_width: 200,
            row_height_coef: 0.75,
            pixels_to_width_divider: 7.0,
            label_column_width: 30.0,
            name_column_width: 40.0,
            output_file: "output.xlsx".to_string(),
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_scale: 14.0,
            box_thickness: 2,
            point_radius: 5,
        }
    }
}

impl AppConfig {
    pub fn images_dir(&self) -> PathBuf {
        self.data_root.join("images")
    }

    pub fn cropped_dir(&self) -> PathBuf {
        self.data_root.join("cropped")
    }

    pub fn rec_dir(&self) -> PathBuf {
        self.data_root.join("rec")
    }

    pub fn annotations_path(&self) -> PathBuf {
        self.data_root.join(&self.annotations_file)
    }

    pub fn brands_path(&self) -> PathBuf {
        self.data_root.join(&self.brands_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.data_root.join(&self.report.output_file)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.report.validate()
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.headers.len() != FIXED_COLUMNS {
            return Err(Error::InvalidConfig(format!(
                "report.headers must name exactly {} columns, got {}",
                FIXED_COLUMNS,
                self.headers.len()
            )));
        }
        if self.img_max_width == 0 {
            return Err(Error::InvalidConfig(
                "report.img_max_width must be positive".to_string(),
            ));
        }
        if self.pixels_to_width_divider <= 0.0 || self.row_height_coef <= 0.0 {
            return Err(Error::InvalidConfig(
                "report.pixels_to_width_divider and report.row_height_coef must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `Cropsheet.toml` (optional) overlaid with `CROPSHEET__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(Path::new("Cropsheet"))
}

pub fn load_configuration_from(file_stem: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(&file_stem.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("CROPSHEET").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.report.headers.len(), FIXED_COLUMNS);
        assert_eq!(config.output_path(), PathBuf::from("data").join("output.xlsx"));
    }

    #[test]
    fn test_absolute_annotations_path_ignores_data_root() {
        let tmp = tempdir().unwrap();
        let abs = tmp.path().join("export.xml");
        let config = AppConfig {
            annotations_file: abs.clone(),
            ..AppConfig::default()
        };
        assert_eq!(config.annotations_path(), abs);
    }

    #[test]
    fn test_rejects_wrong_header_count() {
        let mut config = AppConfig::default();
        config.report.headers.pop();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let tmp = tempdir().unwrap();
        let stem = tmp.path().join("Cropsheet");
        fs::write(
            tmp.path().join("Cropsheet.toml"),
            concat!(
                "data_root = \"/srv/batch\"\n",
                "process_by_brands = true\n\n",
                "[report]\n",
                "img_max_width = 320\n",
            ),
        )
        .unwrap();

        let config = load_configuration_from(&stem).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/srv/batch"));
        assert!(config.process_by_brands);
        assert_eq!(config.report.img_max_width, 320);
        assert_eq!(config.report.output_file, "output.xlsx");
        assert!(config.visualize);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = load_configuration_from(&tmp.path().join("Absent")).unwrap();
        assert_eq!(config.report.img_max_width, 200);
    }
}
