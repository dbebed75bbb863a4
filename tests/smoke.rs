use tilevips::{Image, LoadOptions, Value};

#[test]
fn black_image_properties() {
    let im = Image::black(100, 100, 1).unwrap();
    assert_eq!(im.width(), 100);
    assert_eq!(im.height(), 100);
    assert_eq!(im.max().unwrap(), 0.0);
}

#[test]
fn matrix_image_keeps_scale_and_offset() {
    let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
    let im = Image::new_from_array(&rows, 8.0, 128.0).unwrap();
    assert_eq!(im.get("scale").unwrap(), Value::Double(8.0));
    assert_eq!(im.get("offset").unwrap(), Value::Double(128.0));
    assert_eq!((im.width(), im.height(), im.bands()), (3, 3, 1));
    assert_eq!(im.max().unwrap(), 9.0);
    assert_eq!(im.min().unwrap(), 1.0);
}

#[test]
fn version_is_reported() {
    assert!((0..3).all(|c| tilevips::version(c).is_some()));
}

#[test]
fn file_round_trip_records_filename() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.png");
    let ramp = Image::xyz(40, 20)
        .unwrap()
        .extract_band(0, 1)
        .unwrap()
        .cast(tilevips::BandFormat::UChar);
    ramp.write_to_file(&path).unwrap();

    let back = Image::new_from_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!((back.width(), back.height(), back.bands()), (40, 20, 1));
    assert_eq!(back.max().unwrap(), 39.0);
    assert_eq!(
        back.get("filename").unwrap(),
        Value::Str(path.display().to_string())
    );
    assert!(back.get_fields().contains(&"filename".to_string()));
}

#[test]
fn unknown_suffix_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let im = Image::black(4, 4, 1).unwrap();
    assert!(matches!(
        im.write_to_file(&dir.path().join("out.xyz")),
        Err(tilevips::Error::Native(
            tilevips::native::NativeError::UnsupportedFormat(_)
        ))
    ));
}
