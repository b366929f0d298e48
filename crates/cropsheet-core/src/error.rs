use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed or unreadable annotation export. Fatal.
    #[error("Failed to parse annotations {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Brand workbook could not be read. Recovered as unfiltered mode.
    #[error("Unable to open brands list {}: {message}", path.display())]
    BrandLoad { path: PathBuf, message: String },

    /// Missing or undecodable source image while cropping. Fatal.
    #[error("Source image {}: {source}", path.display())]
    SourceImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A box whose corners are inverted or coincide has nothing to crop. Fatal.
    #[error("Box on {} has no area ({width}x{height})", path.display())]
    EmptyCrop {
        path: PathBuf,
        width: i64,
        height: i64,
    },

    /// A crop could not be embedded into the report. Recovered per cell.
    #[error("Failed to embed {} in report: {message}", path.display())]
    Embed { path: PathBuf, message: String },

    /// Rendering an annotated review image failed. Recovered per image.
    #[error("Failed to visualize annotations for {}: {message}", path.display())]
    Visualization { path: PathBuf, message: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl Error {
    /// True for the classes the pipeline logs and carries on from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BrandLoad { .. } | Error::Embed { .. } | Error::Visualization { .. }
        )
    }
}
