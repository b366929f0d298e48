use crate::annotations::PixelBox;
use crate::config::AppConfig;
use crate::error::Error;
use image::{imageops, DynamicImage, GenericImageView, ImageDecoder, ImageReader, ImageResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First path of `stem.ext`, `stem_1.ext`, `stem_2.ext`, ... that does not exist yet.
pub fn unique_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1u32;
    loop {
        let candidate = parent.join(format!("{}_{}{}", stem, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// `<prefix><name>` with directory separators of the image name flattened to `_`.
pub fn flat_file_name(prefix: &str, image_name: &str) -> String {
    format!("{}{}", prefix, image_name.replace(['/', '\\'], "_"))
}

pub fn crop_file_name(image_name: &str) -> String {
    flat_file_name("cropped_", image_name)
}

/// Decode an image and rotate/flip it upright according to its EXIF orientation.
///
/// The file handle is released before returning.
pub fn open_oriented(path: &Path) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Save with the format implied by the extension. JPEG has no alpha, so it gets RGB.
pub fn save_image(image: &DynamicImage, destination: &Path) -> ImageResult<()> {
    let is_jpeg = destination
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));

    if is_jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8()).save(destination)
    } else {
        image.save(destination)
    }
}

/// Cut `bbox` out of the upright source image and write it to `destination`.
///
/// Coordinates are not clamped: the crop is always `width x height` of the box,
/// and any part lying outside the source is filled with black.
pub fn save_crop(source: &Path, bbox: PixelBox, destination: &Path) -> Result<(), Error> {
    let image = open_oriented(source).map_err(|e| Error::SourceImage {
        path: source.to_path_buf(),
        source: e,
    })?;

    let cropped = crop_padded(&image, bbox).ok_or_else(|| Error::EmptyCrop {
        path: source.to_path_buf(),
        width: bbox.width(),
        height: bbox.height(),
    })?;
    save_image(&cropped, destination)?;
    Ok(())
}

/// `None` when the box has no area.
fn crop_padded(image: &DynamicImage, bbox: PixelBox) -> Option<DynamicImage> {
    let width = u32::try_from(bbox.width()).ok().filter(|w| *w > 0)?;
    let height = u32::try_from(bbox.height()).ok().filter(|h| *h > 0)?;

    let (image_width, image_height) = image.dimensions();
    let inside = bbox.x1 >= 0
        && bbox.y1 >= 0
        && bbox.x2 <= i64::from(image_width)
        && bbox.y2 <= i64::from(image_height);
    if inside {
        return Some(image.crop_imm(bbox.x1 as u32, bbox.y1 as u32, width, height));
    }

    let mut canvas = DynamicImage::new(width, height, image.color());
    imageops::replace(&mut canvas, image, -bbox.x1, -bbox.y1);
    Some(canvas)
}

/// Writes crops from `images/` into `cropped/`, never overwriting an earlier crop.
#[derive(Debug, Clone)]
pub struct CropWriter {
    images_dir: PathBuf,
    cropped_dir: PathBuf,
}

impl CropWriter {
    pub fn new(images_dir: impl Into<PathBuf>, cropped_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            cropped_dir: cropped_dir.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.images_dir(), config.cropped_dir())
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn cropped_dir(&self) -> &Path {
        &self.cropped_dir
    }

    /// Delete any previous `cropped/` folder and recreate it empty.
    pub fn prepare(&self) -> Result<(), Error> {
        if self.cropped_dir.exists() {
            info!("Clearing {}", self.cropped_dir.display());
            fs::remove_dir_all(&self.cropped_dir)?;
        }
        fs::create_dir_all(&self.cropped_dir)?;
        Ok(())
    }

    /// Crop `bbox` from the named source image. Returns the path written.
    pub fn write_crop(&self, image_name: &str, bbox: PixelBox) -> Result<PathBuf, Error> {
        let source = self.images_dir.join(image_name);
        let destination = unique_filename(&self.cropped_dir.join(crop_file_name(image_name)));
        save_crop(&source, bbox, &destination)?;
        debug!(
            "Cropped ({}, {}, {}, {}) from {} to {}",
            bbox.x1,
            bbox.y1,
            bbox.x2,
            bbox.y2,
            source.display(),
            destination.display()
        );
        Ok(destination)
    }
}
