use std::path::Path;

use burn_ndarray::NdArray;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use mireg_core::tensor;
use mireg_io::dicom_io::{read_dicom_series, read_dicom_series_by_uid, scan_dicom_directory, LoadOptions};

type TestBackend = NdArray<f32>;

const ROWS: usize = 4;
const COLS: usize = 6;

struct Slice<'a> {
    series_uid: &'a str,
    modality: &'a str,
    index: usize,
    z: f64,
    slope: f64,
    intercept: f64,
}

/// Multi-valued DS element value.
fn decimal_strings(values: &[&str]) -> PrimitiveValue {
    PrimitiveValue::Strs(values.iter().map(|v| v.to_string()).collect())
}

/// Writes one MONOCHROME2 16-bit slice whose stored value at (row, col) is
/// `100 * index + 10 * row + col`.
fn write_slice(dir: &Path, slice: &Slice) {
    let instance_uid = format!("{}.{}", slice.series_uid, slice.index + 1);
    let pixels: Vec<u16> = (0..ROWS * COLS)
        .map(|i| (100 * slice.index + 10 * (i / COLS) + i % COLS) as u16)
        .collect();

    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(uids::CT_IMAGE_STORAGE)));
    obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(instance_uid.as_str())));
    obj.put(DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from(slice.modality)));
    obj.put(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("PHANTOM")));
    obj.put(DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from(slice.series_uid)));
    obj.put(DataElement::new(tags::SERIES_DESCRIPTION, VR::LO, PrimitiveValue::from("synthetic")));
    obj.put(DataElement::new(
        tags::IMAGE_POSITION_PATIENT,
        VR::DS,
        decimal_strings(&["10", "-5", slice.z.to_string().as_str()]),
    ));
    obj.put(DataElement::new(
        tags::IMAGE_ORIENTATION_PATIENT,
        VR::DS,
        decimal_strings(&["1", "0", "0", "0", "1", "0"]),
    ));
    obj.put(DataElement::new(tags::PIXEL_SPACING, VR::DS, decimal_strings(&["0.5", "0.75"])));
    obj.put(DataElement::new(tags::SLICE_THICKNESS, VR::DS, PrimitiveValue::from("2")));
    obj.put(DataElement::new(tags::RESCALE_SLOPE, VR::DS, PrimitiveValue::from(slice.slope.to_string())));
    obj.put(DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, PrimitiveValue::from(slice.intercept.to_string())));
    obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1u16)));
    obj.put(DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, PrimitiveValue::from("MONOCHROME2")));
    obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(ROWS as u16)));
    obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(COLS as u16)));
    obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16u16)));
    obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16u16)));
    obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15u16)));
    obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0u16)));
    obj.put(DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(pixels.into())));

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(instance_uid.as_str()),
        )
        .unwrap();
    file.write_to_file(dir.join(format!("{}_{}.dcm", slice.modality, slice.index))).unwrap();
}

fn write_series(dir: &Path, series_uid: &str, modality: &str, depth: usize, slope: f64, intercept: f64) {
    // Written in reverse so the loader has to sort by position.
    for index in (0..depth).rev() {
        write_slice(
            dir,
            &Slice {
                series_uid,
                modality,
                index,
                z: 2.0 * index as f64,
                slope,
                intercept,
            },
        );
    }
}

#[test]
fn scans_and_groups_series() {
    let temp = tempfile::tempdir().unwrap();
    write_series(temp.path(), "1.2.826.0.1.1", "CT", 3, 1.0, 0.0);
    let mr_dir = temp.path().join("mr");
    std::fs::create_dir(&mr_dir).unwrap();
    write_series(&mr_dir, "1.2.826.0.1.2", "MR", 2, 1.0, 0.0);

    let series = scan_dicom_directory(temp.path()).unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].series_instance_uid, "1.2.826.0.1.1");
    assert_eq!(series[0].modality, "CT");
    assert_eq!(series[0].file_paths.len(), 3);
    assert_eq!(series[1].modality, "MR");
    assert_eq!(series[1].file_paths.len(), 2);

    // Two series and no UID is ambiguous.
    let device = Default::default();
    let err = read_dicom_series::<TestBackend, _>(temp.path(), &device).unwrap_err();
    assert!(err.to_string().contains("Multiple DICOM series"));
}

#[test]
fn loads_geometry_and_rescaled_values() {
    let temp = tempfile::tempdir().unwrap();
    write_series(temp.path(), "1.2.826.0.1.3", "CT", 3, 2.0, -1024.0);

    let device = Default::default();
    let image =
        read_dicom_series_by_uid::<TestBackend, _>(temp.path(), "1.2.826.0.1.3", &LoadOptions::default(), &device)
            .unwrap();

    assert_eq!(image.shape(), [3, ROWS, COLS]);
    assert_eq!(image.size(), [COLS, ROWS, 3]);
    assert_eq!(image.spacing().to_vec(), vec![0.75, 0.5, 2.0]);
    assert_eq!(image.origin().to_vec(), vec![10.0, -5.0, 0.0]);

    let values = tensor::to_vec(image.data().clone());
    // Slice 2, row 1, column 3: stored 213.
    let flat = 2 * ROWS * COLS + COLS + 3;
    assert_eq!(values[flat], 2.0 * 213.0 - 1024.0);
    assert_eq!(values[0], -1024.0);
}

#[test]
fn memory_constrained_loading_shrinks_large_axes() {
    let temp = tempfile::tempdir().unwrap();
    write_series(temp.path(), "1.2.826.0.1.4", "MR", 4, 1.0, 0.0);

    let device = Default::default();
    let options = LoadOptions::memory_constrained(3);
    let image = read_dicom_series_by_uid::<TestBackend, _>(temp.path(), "1.2.826.0.1.4", &options, &device).unwrap();

    // x: 6 → factor 2, y: 4 → factor 2, z: 4 → factor 2.
    assert_eq!(image.size(), [3, 2, 2]);
    assert_eq!(image.spacing().to_vec(), vec![1.5, 1.0, 4.0]);
    assert_eq!(image.origin().to_vec(), vec![10.0, -5.0, 0.0]);
}

#[cfg(unix)]
#[test]
fn symlinked_directories_are_not_followed() {
    use std::os::unix::fs::symlink;

    let temp = tempfile::tempdir().unwrap();
    let ct_dir = temp.path().join("ct");
    std::fs::create_dir(&ct_dir).unwrap();
    write_series(&ct_dir, "1.2.826.0.1.9", "CT", 3, 1.0, 0.0);
    symlink(&ct_dir, temp.path().join("ct_link")).unwrap();
    // Cycle back to the root.
    symlink(temp.path(), ct_dir.join("up")).unwrap();

    let series = scan_dicom_directory(temp.path()).unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].file_paths.len(), 3);

    let device = Default::default();
    let image =
        read_dicom_series_by_uid::<TestBackend, _>(temp.path(), "1.2.826.0.1.9", &LoadOptions::default(), &device)
            .unwrap();
    assert_eq!(image.shape(), [3, ROWS, COLS]);
    assert_eq!(image.spacing().to_vec()[2], 2.0);
}
