use std::fs;
use std::path::Path;
use tempfile::tempdir;

use calamine::{open_workbook_auto, Data, Reader};
use cropsheet_core::config::FIXED_COLUMNS;
use cropsheet_core::{AppConfig, Error, Pipeline, SilentReporter};
use image::{Rgb, RgbImage};
use rust_xlsxwriter::Workbook;

/// Lay out a data root:
///   root/
///     images/shelf.png   (100x100)
///     images/aisle.png   (100x100)
///     annotations.xml
///     brands.xlsx        (only when `brands` is given)
fn create_data_root(root: &Path, annotations: &str, brands: Option<&[&str]>) {
    let images = root.join("images");
    fs::create_dir_all(&images).unwrap();
    for name in ["shelf.png", "aisle.png"] {
        RgbImage::from_fn(100, 100, |x, y| Rgb([x as u8, y as u8, 128]))
            .save(images.join(name))
            .unwrap();
    }
    fs::write(root.join("annotations.xml"), annotations).unwrap();

    if let Some(brands) = brands {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (row, brand) in brands.iter().enumerate() {
            sheet.write_string(row as u32, 0, *brand).unwrap();
        }
        workbook.save(root.join("brands.xlsx")).unwrap();
    }
}

fn config_for(root: &Path) -> AppConfig {
    AppConfig {
        data_root: root.to_path_buf(),
        ..AppConfig::default()
    }
}

fn read_report(path: &Path) -> Vec<Vec<Data>> {
    let mut workbook = open_workbook_auto(path).unwrap();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    range.rows().map(|r| r.to_vec()).collect()
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

const SINGLE_MATCH: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotations>
  <version>1.1</version>
  <image id="0" name="shelf.png" width="100" height="100">
    <box label="ignore" xtl="60" ytl="60" xbr="90" ybr="90"/>
    <box label="car" xtl="10" ytl="10" xbr="50" ybr="50"/>
    <points label="toyota" points="20,20"/>
  </image>
</annotations>"#;

#[test]
fn test_full_pipeline_with_brand_filter() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    create_data_root(root, SINGLE_MATCH, Some(&["Toyota"]));

    let result = Pipeline::new(config_for(root)).run(&SilentReporter).unwrap();

    assert!(!result.cover_all);
    assert_eq!(result.images_total, 1);
    assert_eq!(result.images_matched, 1);
    assert_eq!(result.crops_written, 1);
    assert_eq!(count_files(&root.join("cropped")), 1);
    assert!(root.join("cropped").join("cropped_shelf.png").exists());

    let crop = image::open(root.join("cropped").join("cropped_shelf.png")).unwrap();
    assert_eq!((crop.width(), crop.height()), (40, 40));

    assert_eq!(result.report.rows, 1);
    assert_eq!(result.report.images_embedded, 1);
    assert!(result.report.embed_failures.is_empty());
    assert_eq!(result.report.annotated, 1);
    assert!(root.join("rec").join("annotated_shelf.png").exists());

    let rows = read_report(&root.join("output.xlsx"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), FIXED_COLUMNS + 1);
    assert_eq!(rows[0][FIXED_COLUMNS], Data::String("photo1".to_string()));
    assert_eq!(rows[1][0], Data::String("toyota".to_string()));
    assert_eq!(rows[1][3], Data::String("0".to_string()));
    assert_eq!(rows[1][4], Data::String("shelf.png".to_string()));
    assert_eq!(rows[1][5], Data::Float(1.0));

    // Finalized records carry no ignore boxes and no points.
    let record = &result.records[0];
    assert!(record.points.is_empty());
    assert_eq!(record.boxes.len(), 1);
    assert_eq!(record.boxes[0].label, "toyota");
    assert_eq!(record.boxes[0].cropped_name.as_deref(), Some("cropped_shelf.png"));
}

#[test]
fn test_missing_brands_falls_back_to_inclusive_point_matching() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let xml = r#"<annotations>
      <image id="0" name="shelf.png">
        <box label="car" xtl="0" ytl="0" xbr="10" ybr="10"/>
        <points label="anything" points="0,5"/>
      </image>
      <image id="1" name="aisle.png">
        <box label="car" xtl="0" ytl="0" xbr="10" ybr="10"/>
        <points label="elsewhere" points="70,70"/>
      </image>
    </annotations>"#;
    create_data_root(root, xml, None);

    let mut config = config_for(root);
    config.visualize = false;
    let result = Pipeline::new(config).run(&SilentReporter).unwrap();

    assert!(result.cover_all);
    assert_eq!(result.images_matched, 1);
    assert_eq!(result.crops_written, 1);
    assert_eq!(result.records[0].boxes[0].label, "anything");
    assert_eq!(result.report.annotated, 0);
    assert!(!root.join("rec").exists());
}

#[test]
fn test_process_by_brands_crops_every_box() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let xml = r#"<annotations>
      <image id="0" name="shelf.png">
        <box label="bmw" xtl="0" ytl="0" xbr="30" ybr="30"/>
        <box label="bmw" xtl="40" ytl="40" xbr="80" ybr="80"/>
        <box label="IGNORE" xtl="5" ytl="5" xbr="15" ybr="15"/>
      </image>
      <image id="1" name="aisle.png">
        <box label="audi" xtl="0" ytl="0" xbr="30" ybr="30"/>
      </image>
    </annotations>"#;
    create_data_root(root, xml, None);

    let mut config = config_for(root);
    config.process_by_brands = true;
    config.visualize = false;
    let result = Pipeline::new(config).run(&SilentReporter).unwrap();

    assert!(result.cover_all);
    assert_eq!(result.crops_written, 4);
    assert_eq!(count_files(&root.join("cropped")), 4);

    let rows = read_report(&root.join("output.xlsx"));
    let labels: Vec<&Data> = rows.iter().skip(1).map(|r| &r[0]).collect();
    assert_eq!(
        labels,
        [
            &Data::String("audi".to_string()),
            &Data::String("bmw".to_string())
        ]
    );
    assert_eq!(rows[2][5], Data::Float(2.0));
    assert_eq!(rows[0].len(), FIXED_COLUMNS + 2);
    assert!(result.records.iter().all(|r| r.boxes.iter().all(|b| !b.is_ignored())));
}

#[test]
fn test_stale_crops_are_removed() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    create_data_root(root, SINGLE_MATCH, Some(&["toyota"]));
    fs::create_dir_all(root.join("cropped")).unwrap();
    fs::write(root.join("cropped").join("cropped_old.png"), b"stale").unwrap();

    let mut config = config_for(root);
    config.visualize = false;
    Pipeline::new(config).run(&SilentReporter).unwrap();

    assert!(!root.join("cropped").join("cropped_old.png").exists());
    assert_eq!(count_files(&root.join("cropped")), 1);
}

#[test]
fn test_malformed_annotations_abort_without_report() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    create_data_root(root, "<annotations><image id=\"0\">", Some(&["toyota"]));

    let err = Pipeline::new(config_for(root)).run(&SilentReporter).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(!err.is_recoverable());
    assert!(!root.join("output.xlsx").exists());
}

#[test]
fn test_missing_source_image_aborts_run() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let xml = r#"<annotations><image id="0" name="gone.png">
        <box label="car" xtl="10" ytl="10" xbr="50" ybr="50"/>
        <points label="toyota" points="20,20"/>
    </image></annotations>"#;
    create_data_root(root, xml, Some(&["toyota"]));

    let err = Pipeline::new(config_for(root)).run(&SilentReporter).unwrap_err();
    assert!(matches!(err, Error::SourceImage { .. }));
    assert!(!root.join("output.xlsx").exists());
}

#[test]
fn test_box_outside_image_yields_black_crop_and_report() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let xml = r#"<annotations>
      <image id="0" name="shelf.png">
        <box label="car" xtl="150" ytl="150" xbr="180" ybr="180"/>
      </image>
      <image id="1" name="aisle.png">
        <box label="car" xtl="90" ytl="0" xbr="120" ybr="10"/>
      </image>
    </annotations>"#;
    create_data_root(root, xml, None);

    let mut config = config_for(root);
    config.process_by_brands = true;
    config.visualize = false;
    let result = Pipeline::new(config).run(&SilentReporter).unwrap();

    assert_eq!(result.crops_written, 2);
    assert!(root.join("output.xlsx").exists());

    let outside = image::open(root.join("cropped").join("cropped_shelf.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(outside.dimensions(), (30, 30));
    assert!(outside.pixels().all(|p| p == &Rgb([0, 0, 0])));

    let straddling = image::open(root.join("cropped").join("cropped_aisle.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(straddling.dimensions(), (30, 10));
    assert_eq!(straddling.get_pixel(0, 0), &Rgb([90, 0, 128]));
    assert_eq!(straddling.get_pixel(10, 0), &Rgb([0, 0, 0]));
}

#[test]
fn test_visualize_all_renders_every_image() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let xml = r#"<annotations>
      <image id="0" name="shelf.png"><box label="car" xtl="1" ytl="1" xbr="9" ybr="9"/></image>
      <image id="1" name="aisle.png"/>
      <image id="2" name="missing.png"/>
    </annotations>"#;
    create_data_root(root, xml, None);

    let (rendered, failures) = Pipeline::new(config_for(root))
        .visualize_all(&SilentReporter)
        .unwrap();
    assert_eq!(rendered, 2);
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], Error::Visualization { .. }));
    assert!(root.join("rec").join("annotated_aisle.png").exists());
    assert!(!root.join("cropped").exists());
}
