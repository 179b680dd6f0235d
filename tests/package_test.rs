//! Reading packages: resolution, plates, bounds and plate extraction

mod common;

use common::*;
use platekit::{
    BoundsScope, Error, Package, PartTable, PrinterProfile, Provenance, Warning, bounds,
    detect_plates, extract_plate, resolve_objects, validate_plate,
};
use tempfile::tempdir;

const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <object id="1">
    <metadata key="name" value="Left bracket"/>
  </object>
  <plate>
    <metadata key="plater_id" value="2"/>
    <metadata key="plater_name" value="Spares"/>
  </plate>
</config>"#;

fn three_plates() -> String {
    let resources = format!(
        r#"<object id="1" type="model">{}</object>
    <object id="2" name="Lid" type="model">{}</object>"#,
        cube_mesh(10.0),
        cube_mesh(30.0)
    );
    let build = r#"<item objectid="1" transform="1 0 0 0 1 0 0 0 1 10 10 0"/>
    <item objectid="2" transform="1 0 0 0 1 0 0 0 1 100 100 0"/>
    <item objectid="2" transform="1 0 0 0 1 0 0 0 1 200 200 0" printable="0"/>"#;
    model_xml(&resources, build)
}

#[test]
fn test_resolve_component_into_sub_file() {
    let (main, sub) = vendor_object_parts("object_7");
    let bytes = package_bytes(&[(MODEL_PATH, &main), ("3D/Objects/object_7.model", &sub)]);
    let package = Package::from_bytes(&bytes).unwrap();

    let objects = resolve_objects(&package);
    assert_eq!(objects.len(), 1);
    let info = &objects[0];
    assert_eq!(info.id, 2);
    assert_eq!(info.name, "object_7");
    assert_eq!(info.vertex_count, 8);
    assert_eq!(info.triangle_count, 12);
    assert_eq!(
        info.provenance,
        Provenance::External {
            path: Some("3D/Objects/object_7.model".to_string()),
            object_id: 1,
        }
    );

    let report = bounds(&package, BoundsScope::Whole).unwrap();
    let aabb = report.aabb.unwrap();
    assert_eq!((aabb.min.x, aabb.min.y, aabb.min.z), (100.0, 100.0, 0.0));
    assert_eq!((aabb.max.x, aabb.max.y, aabb.max.z), (110.0, 110.0, 10.0));
}

#[test]
fn test_missing_sub_file_is_a_warning() {
    let (main, _) = vendor_object_parts("gone");
    let package = Package::from_bytes(&package_bytes(&[(MODEL_PATH, &main)])).unwrap();

    assert_eq!(
        package.warnings(),
        &[Warning::UnreadableSubModel {
            path: "3D/Objects/gone.model".to_string()
        }]
    );
    assert!(resolve_objects(&package).is_empty());
    assert!(bounds(&package, BoundsScope::Whole).unwrap().aabb.is_none());
}

#[test]
fn test_missing_geometry_part() {
    let err = Package::from_bytes(&package_bytes(&[])).unwrap_err();
    assert!(matches!(err, Error::MissingRequiredPart(_)));
}

#[test]
fn test_not_a_zip() {
    let err = Package::from_bytes(b"definitely not a zip").unwrap_err();
    assert!(matches!(err, Error::CorruptArchive(_)));
}

#[test]
fn test_detect_plates_with_vendor_names() {
    let model = three_plates();
    let bytes = package_bytes(&[(MODEL_PATH, &model), ("Metadata/model_settings.config", SETTINGS)]);
    let package = Package::from_bytes(&bytes).unwrap();

    let layout = detect_plates(&package).unwrap();
    assert!(layout.is_multi_plate);
    assert_eq!(layout.plates.len(), 3);

    let names: Vec<&str> = layout.plates.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Left bracket", "Spares", "Lid"]);
    assert!(!layout.plate(3).unwrap().printable);
    assert_eq!(layout.plate(2).unwrap().translation().x, 100.0);
    assert!(layout.warnings.is_empty());
}

#[test]
fn test_plate_bounds() {
    let model = three_plates();
    let package = Package::from_bytes(&package_bytes(&[(MODEL_PATH, &model)])).unwrap();

    let plate = bounds(&package, BoundsScope::Plate(2)).unwrap().aabb.unwrap();
    assert_eq!(plate.size().x, 30.0);
    assert_eq!(plate.min.x, 100.0);

    let whole = bounds(&package, BoundsScope::Whole).unwrap().aabb.unwrap();
    assert_eq!((whole.min.x, whole.max.x), (10.0, 230.0));

    let err = bounds(&package, BoundsScope::Plate(4)).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
}

#[test]
fn test_validate_multi_plate() {
    let model = three_plates();
    let package = Package::from_bytes(&package_bytes(&[(MODEL_PATH, &model)])).unwrap();
    let printer = PrinterProfile::default();

    let whole = validate_plate(&package, None, &printer).unwrap();
    assert!(whole.is_multi_plate);
    assert!(whole.fits);
    assert!(
        whole
            .warnings
            .iter()
            .any(|w| w.to_string().starts_with("Multi-plate file with 3 plates"))
    );

    let third = validate_plate(&package, Some(3), &printer).unwrap();
    assert_eq!(third.validated_plate, Some(3));
    assert_eq!(
        third.warnings,
        vec![Warning::Note("Plate 3 is marked as non-printable".to_string())]
    );
}

#[test]
fn test_extract_plate_marks_printable() {
    let dir = tempdir().unwrap();
    let model = three_plates();
    let source = write_package(
        dir.path(),
        "plates.3mf",
        &[(MODEL_PATH, &model), ("Metadata/model_settings.config", SETTINGS)],
    );
    let dest = dir.path().join("plate2.3mf");

    extract_plate(&source, 2, &dest).unwrap();

    let package = Package::open(&dest).unwrap();
    let flags: Vec<bool> = package.model().build.items.iter().map(|i| i.printable).collect();
    assert_eq!(flags, vec![false, true, false]);
    assert_eq!(read_part(&dest, "Metadata/model_settings.config"), SETTINGS);

    // the source is left alone
    let original = Package::open(&source).unwrap();
    assert!(original.model().build.items[0].printable);
}

#[test]
fn test_extract_plate_out_of_range() {
    let dir = tempdir().unwrap();
    let model = three_plates();
    let source = write_package(dir.path(), "plates.3mf", &[(MODEL_PATH, &model)]);
    let dest = dir.path().join("out.3mf");

    let err = extract_plate(&source, 0, &dest).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    let err = extract_plate(&source, 4, &dest).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    assert!(!dest.exists());
}

#[test]
fn test_extract_single_plate_copies_bytes() {
    let dir = tempdir().unwrap();
    let source = single_cube_package(dir.path());
    let dest = dir.path().join("copy.3mf");

    extract_plate(&source, 1, &dest).unwrap();
    assert_eq!(std::fs::read(&source).unwrap(), std::fs::read(&dest).unwrap());
}

#[test]
fn test_part_table_preserves_unknown_parts() {
    let thumbnail = "not really a png";
    let bytes = package_bytes(&[
        (MODEL_PATH, &three_plates()),
        ("Metadata/plate_1.png", thumbnail),
    ]);
    let parts = PartTable::from_bytes(&bytes).unwrap();
    assert_eq!(parts.model_path(), MODEL_PATH);

    let rewritten = PartTable::from_bytes(&parts.to_bytes(&platekit::Rewrite::new()).unwrap()).unwrap();
    assert_eq!(rewritten.read("Metadata/plate_1.png").unwrap(), thumbnail.as_bytes());
    assert!(rewritten.contains("[Content_Types].xml"));
}
