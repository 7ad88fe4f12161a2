//! Reading medical image volumes.

pub mod dicom_io;

pub use dicom_io::{
    load_dicom_series, read_dicom_series, read_dicom_series_by_uid, scan_dicom_directory, select_series,
    DicomSeriesInfo, LoadOptions,
};
