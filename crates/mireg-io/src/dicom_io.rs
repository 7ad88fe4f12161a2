//! DICOM series discovery and volume reading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject, OpenFileOptions};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use mireg_core::filter::DownsampleFilter;
use mireg_core::image::Image;
use mireg_core::spatial::{Direction, Point, Spacing};
use nalgebra::{Matrix3, Point3 as NaPoint3, Vector3 as NaVector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

type DicomFile = FileDicomObject<InMemDicomObject>;

/// Metadata for a discovered DICOM series
#[derive(Debug, Clone)]
pub struct DicomSeriesInfo {
    pub series_instance_uid: String,
    pub series_description: String,
    pub modality: String,
    pub patient_id: String,
    pub file_paths: Vec<PathBuf>,
}

/// How a series is turned into a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Shrink the volume after reading so no axis exceeds `max_extent`.
    pub memory_constrained: bool,
    pub max_extent: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            memory_constrained: false,
            max_extent: 64,
        }
    }
}

impl LoadOptions {
    pub fn memory_constrained(max_extent: usize) -> Self {
        Self {
            memory_constrained: true,
            max_extent,
        }
    }

    /// Integer shrink factor per `(x, y, z)` axis for a volume of `size`.
    pub fn shrink_factors(&self, size: [usize; 3]) -> [usize; 3] {
        if !self.memory_constrained || self.max_extent == 0 {
            return [1; 3];
        }
        size.map(|s| s.div_ceil(self.max_extent).max(1))
    }
}

/// Regular files under `root`. Symlinks are not followed, so linked
/// directories and link cycles are never walked.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(walk_error).context("Failed to read DICOM directory")?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Strips the path from a walk error.
fn walk_error(err: walkdir::Error) -> anyhow::Error {
    match err.io_error() {
        Some(io) => anyhow!("{}", io.kind()),
        None => anyhow!("file system loop"),
    }
}

/// Scan a directory tree for DICOM series, grouping files by
/// SeriesInstanceUID.
///
/// Headers are parsed in parallel up to the pixel data. Files that are not
/// DICOM, or carry no series UID, are skipped. Series come back sorted by UID.
pub fn scan_dicom_directory<P: AsRef<Path>>(path: P) -> Result<Vec<DicomSeriesInfo>> {
    let files = collect_files(path.as_ref())?;

    let headers: Vec<(PathBuf, String, String, String, String)> = files
        .par_iter()
        .filter_map(|file_path| {
            let obj = OpenFileOptions::new()
                .read_until(tags::PIXEL_DATA)
                .open_file(file_path)
                .ok()?;
            let uid = get_string(&obj, tags::SERIES_INSTANCE_UID)?;
            Some((
                file_path.clone(),
                uid,
                get_string(&obj, tags::SERIES_DESCRIPTION).unwrap_or_default(),
                get_string(&obj, tags::MODALITY).unwrap_or_default(),
                get_string(&obj, tags::PATIENT_ID).unwrap_or_default(),
            ))
        })
        .collect();

    debug!(files = files.len(), dicom = headers.len(), "scanned directory");

    let mut series_map = BTreeMap::<String, DicomSeriesInfo>::new();
    for (file_path, uid, description, modality, patient_id) in headers {
        series_map
            .entry(uid.clone())
            .or_insert_with(|| DicomSeriesInfo {
                series_instance_uid: uid,
                series_description: description,
                modality,
                patient_id,
                file_paths: Vec::new(),
            })
            .file_paths
            .push(file_path);
    }

    let mut series_list: Vec<DicomSeriesInfo> = series_map.into_values().collect();
    // load_dicom_series re-sorts spatially; this only makes the listing stable
    for series in &mut series_list {
        series.file_paths.sort();
    }
    Ok(series_list)
}

/// Pick a series from a scan.
///
/// With a UID the matching series is returned. Without one the scan must
/// contain exactly one series.
pub fn select_series<'a>(series: &'a [DicomSeriesInfo], uid: Option<&str>) -> Result<&'a DicomSeriesInfo> {
    let selected = match uid {
        Some(uid) => series
            .iter()
            .find(|s| s.series_instance_uid == uid)
            .ok_or_else(|| anyhow!("No DICOM series with UID {uid} found"))?,
        None => match series {
            [] => bail!("No DICOM series found"),
            [only] => only,
            _ => bail!(
                "Multiple DICOM series found ({}); select one by Series Instance UID",
                series.len()
            ),
        },
    };
    if selected.file_paths.is_empty() {
        bail!("Series {} has no files", selected.series_instance_uid);
    }
    Ok(selected)
}

/// Load a specific DICOM series into a 3D Image.
///
/// Slices are sorted along the slice normal; orientation and slice spacing
/// must be consistent across the series. Stored values are mapped through
/// RescaleSlope/RescaleIntercept.
pub fn load_dicom_series<B: Backend>(
    series: &DicomSeriesInfo,
    options: &LoadOptions,
    device: &B::Device,
) -> Result<Image<B, 3>> {
    let uid = &series.series_instance_uid;
    if series.file_paths.is_empty() {
        bail!("Series {uid} has no files");
    }

    let slices: Vec<DicomFile> = series
        .file_paths
        .par_iter()
        .map(|p| open_file(p).map_err(|_| anyhow!("Failed to open a file of series {uid}")))
        .collect::<Result<Vec<_>>>()?;

    let orientation = get_f64_vec(&slices[0], tags::IMAGE_ORIENTATION_PATIENT)
        .with_context(|| format!("Missing ImageOrientationPatient in series {uid}"))?;
    if orientation.len() != 6 {
        bail!("Invalid ImageOrientationPatient length {} in series {uid}", orientation.len());
    }
    let dir_x = NaVector3::new(orientation[0], orientation[1], orientation[2]).normalize();
    let dir_y = NaVector3::new(orientation[3], orientation[4], orientation[5]).normalize();
    let dir_z = dir_x.cross(&dir_y).normalize();
    if !dir_z.iter().all(|v| v.is_finite()) {
        bail!("Degenerate ImageOrientationPatient in series {uid}");
    }

    let mut positions = Vec::with_capacity(slices.len());
    for obj in &slices {
        let position = get_position(obj).with_context(|| format!("Missing ImagePositionPatient in series {uid}"))?;
        positions.push(position.coords.dot(&dir_z));
    }
    let mut keyed: Vec<(f64, DicomFile)> = positions.into_iter().zip(slices).collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    let slices: Vec<DicomFile> = keyed.into_iter().map(|(_, obj)| obj).collect();

    let first = &slices[0];
    let rows = get_u32(first, tags::ROWS).with_context(|| format!("Missing Rows in series {uid}"))? as usize;
    let cols = get_u32(first, tags::COLUMNS).with_context(|| format!("Missing Columns in series {uid}"))? as usize;
    let pixel_spacing =
        get_f64_vec(first, tags::PIXEL_SPACING).with_context(|| format!("Missing PixelSpacing in series {uid}"))?;
    if pixel_spacing.len() != 2 {
        bail!("Invalid PixelSpacing length {} in series {uid}", pixel_spacing.len());
    }
    // PixelSpacing is (row spacing, column spacing) = (dy, dx)
    let dy = pixel_spacing[0];
    let dx = pixel_spacing[1];
    let origin_pos = get_position(first).with_context(|| format!("Missing ImagePositionPatient in series {uid}"))?;

    let dz = if slices.len() > 1 {
        let mut gaps = Vec::with_capacity(slices.len() - 1);
        for pair in slices.windows(2) {
            let p1 = get_position(&pair[0]).with_context(|| format!("Missing ImagePositionPatient in series {uid}"))?;
            let p2 = get_position(&pair[1]).with_context(|| format!("Missing ImagePositionPatient in series {uid}"))?;
            gaps.push((p2 - p1).dot(&dir_z).abs());

            if let Some(o) = get_f64_vec(&pair[1], tags::IMAGE_ORIENTATION_PATIENT).filter(|o| o.len() == 6) {
                let cx = NaVector3::new(o[0], o[1], o[2]).normalize();
                let cy = NaVector3::new(o[3], o[4], o[5]).normalize();
                if (cx - dir_x).norm() > 1e-3 || (cy - dir_y).norm() > 1e-3 {
                    bail!("Inconsistent ImageOrientationPatient in series {uid}");
                }
            }
        }
        let min = gaps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if avg <= 0.0 {
            bail!("Slices of series {uid} share one position");
        }
        if max - min > 0.01 * avg {
            bail!("Non-uniform slice spacing in series {uid}: min={min}, max={max}, avg={avg}");
        }
        avg
    } else {
        get_f64(first, tags::SLICE_THICKNESS).unwrap_or(1.0)
    };

    let slice_pixels: Vec<Vec<f32>> = slices
        .par_iter()
        .map(|obj| decode_slice(obj, rows * cols, uid))
        .collect::<Result<Vec<_>>>()?;

    let depth = slices.len();
    let mut flattened = Vec::with_capacity(depth * rows * cols);
    for slice in slice_pixels {
        flattened.extend(slice);
    }

    let tensor = Tensor::<B, 3>::from_data(TensorData::new(flattened, Shape::new([depth, rows, cols])), device);
    let image = Image::new(
        tensor,
        Point::new([origin_pos.x, origin_pos.y, origin_pos.z]),
        Spacing::new([dx, dy, dz]),
        Direction(Matrix3::from_columns(&[dir_x, dir_y, dir_z])),
    );

    let factors = options.shrink_factors(image.size());
    let image = if factors.iter().any(|&f| f > 1) {
        debug!(series = %uid, ?factors, "shrinking volume");
        DownsampleFilter::new(factors.to_vec()).apply(&image)
    } else {
        image
    };

    info!(
        series = %uid,
        modality = %series.modality,
        size = ?image.size(),
        spacing = ?image.spacing().to_vec(),
        "loaded DICOM series"
    );
    Ok(image)
}

fn decode_slice(obj: &DicomFile, expected: usize, uid: &str) -> Result<Vec<f32>> {
    let pixel_data = obj
        .decode_pixel_data()
        .map_err(|e| anyhow!("Failed to decode pixel data of series {uid}: {e}"))?;
    let raw = pixel_data
        .to_vec_with_options::<f32>(&ConvertOptions::new().with_modality_lut(ModalityLutOption::None))
        .map_err(|e| anyhow!("Pixel data conversion error in series {uid}: {e}"))?;
    if raw.len() != expected {
        bail!("Slice data size mismatch in series {uid}: expected {expected}, got {}", raw.len());
    }

    let slope = get_f64(obj, tags::RESCALE_SLOPE).unwrap_or(1.0) as f32;
    let intercept = get_f64(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0) as f32;
    Ok(raw.into_iter().map(|v| v * slope + intercept).collect())
}

/// Scan `path`, pick the series `uid` and load it.
pub fn read_dicom_series_by_uid<B: Backend, P: AsRef<Path>>(
    path: P,
    uid: &str,
    options: &LoadOptions,
    device: &B::Device,
) -> Result<Image<B, 3>> {
    let series_list = scan_dicom_directory(path)?;
    let series = select_series(&series_list, Some(uid))?;
    load_dicom_series(series, options, device).with_context(|| format!("Failed to read series {uid}"))
}

/// Convenience function to read a single series from a directory.
/// If multiple series exist, it errors out to avoid ambiguity.
pub fn read_dicom_series<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let series_list = scan_dicom_directory(path)?;
    let series = select_series(&series_list, None)?;
    load_dicom_series(series, &LoadOptions::default(), device)
}

// --- Helpers ---

fn get_string(obj: &DicomFile, tag: dicom::core::Tag) -> Option<String> {
    obj.element(tag)
        .ok()?
        .to_str()
        .ok()
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
}

fn get_u32(obj: &DicomFile, tag: dicom::core::Tag) -> Option<u32> {
    obj.element(tag).ok()?.to_int::<u32>().ok()
}

fn get_f64(obj: &DicomFile, tag: dicom::core::Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}

fn get_f64_vec(obj: &DicomFile, tag: dicom::core::Tag) -> Option<Vec<f64>> {
    obj.element(tag).ok()?.to_multi_float64().ok()
}

fn get_position(obj: &DicomFile) -> Option<NaPoint3<f64>> {
    match get_f64_vec(obj, tags::IMAGE_POSITION_PATIENT)?.as_slice() {
        &[x, y, z] => Some(NaPoint3::new(x, y, z)),
        _ => None,
    }
}
