use super::{Attributes, BoxRecord, ImageRecord, PointRecord};
use crate::error::Error;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read a CVAT XML export into image records, in document order.
///
/// Only `<image>` children of the root element are read, and within them only
/// `<box>` and `<points>` children. Everything else is ignored. Any XML error
/// fails the whole parse.
pub fn parse_annotations(path: &Path) -> Result<Vec<ImageRecord>, Error> {
    let content = fs::read_to_string(path).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let records = parse_document(&content).map_err(|message| Error::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    debug!("Parsed {} image records from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_annotations_str(xml: &str) -> Result<Vec<ImageRecord>, Error> {
    parse_document(xml).map_err(|message| Error::Parse {
        path: PathBuf::from("<inline>"),
        message,
    })
}

fn parse_document(xml: &str) -> Result<Vec<ImageRecord>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut images = Vec::new();
    let mut current: Option<ImageRecord> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    if saw_root {
                        return Err("multiple root elements".to_string());
                    }
                    saw_root = true;
                } else {
                    handle_element(&e, depth, &mut current)?;
                    if depth == 1 && e.name().as_ref() == b"image" {
                        current = Some(ImageRecord::new(read_attributes(&e)?));
                    }
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if saw_root {
                        return Err("multiple root elements".to_string());
                    }
                    saw_root = true;
                } else if depth == 1 && e.name().as_ref() == b"image" {
                    images.push(ImageRecord::new(read_attributes(&e)?));
                } else {
                    handle_element(&e, depth, &mut current)?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && e.name().as_ref() == b"image" {
                    if let Some(image) = current.take() {
                        images.push(image);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err("no root element found".to_string());
    }
    if depth != 0 {
        return Err("unexpected end of document, unclosed element".to_string());
    }

    Ok(images)
}

/// Attach `<box>` and `<points>` elements that sit directly under the open image.
fn handle_element(
    e: &BytesStart<'_>,
    depth: usize,
    current: &mut Option<ImageRecord>,
) -> Result<(), String> {
    if depth != 2 {
        return Ok(());
    }
    let Some(image) = current.as_mut() else {
        return Ok(());
    };
    match e.name().as_ref() {
        b"box" => image.boxes.push(BoxRecord::from_attributes(read_attributes(e)?)),
        b"points" => image
            .points
            .push(PointRecord::from_attributes(read_attributes(e)?)),
        _ => {}
    }
    Ok(())
}

fn read_attributes(e: &BytesStart<'_>) -> Result<Attributes, String> {
    let mut attributes = Attributes::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = std::str::from_utf8(&attr.value).map_err(|err| err.to_string())?;
        let value = quick_xml::escape::unescape(raw).map_err(|err| err.to_string())?;
        attributes.insert(key, value.into_owned());
    }
    Ok(attributes)
}
