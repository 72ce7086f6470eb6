//! Image import: builds a container from a 7-scenes directory
//!
//! Reads the layout written by [`crate::export`]: `_info.txt` for the
//! header, then `frame-XXXXXX.color.{png|jpg}`, `frame-XXXXXX.depth.pgm`
//! (or a 16-bit `.depth.png`) and `frame-XXXXXX.pose.txt` until the first
//! index with a missing file. Color files are stored verbatim; depth is
//! compressed with the requested codec.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use codec::Codec;
use contracts::{
    CalibrationData, ColorCompression, ContractError, DepthCompression, Mat4, Result,
};
use tracing::{debug, info, instrument, warn};

use crate::export::info_path;
use crate::format::FORMAT_VERSION;
use crate::pose::{load_pose_file, parse_pose};
use crate::{ContainerHeader, FrameFormat, RgbdFrame, SensorData};

/// Import options
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Prefix of every per-frame file
    pub basename: String,
    /// Codec the depth images are compressed with
    pub depth_compression: DepthCompression,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            basename: "frame-".to_string(),
            depth_compression: DepthCompression::default(),
        }
    }
}

/// Result of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub frames_read: usize,
    pub bytes_read: u64,
    /// False if the run was stopped before the last frame
    pub completed: bool,
}

/// Import every frame found in `dir`
pub fn import_images(dir: &Path, options: &ImportOptions) -> Result<SensorData> {
    import_images_until(dir, options, &AtomicBool::new(false)).map(|(data, _)| data)
}

/// Import frames until the directory runs out or `stop` is set
///
/// # Errors
/// - `FileNotFound` if `_info.txt` is missing
/// - `VersionMismatch` if the metadata names another format version
/// - `CorruptStream` for malformed metadata, images or poses, or images
///   whose size differs from the metadata
#[instrument(name = "container_import", skip(options, stop), fields(dir = %dir.display()))]
pub fn import_images_until(
    dir: &Path,
    options: &ImportOptions,
    stop: &AtomicBool,
) -> Result<(SensorData, ImportSummary)> {
    let info = read_file(&info_path(dir))?;
    let info = String::from_utf8_lossy(&info);
    let fields = parse_info(&info);

    let color_compression = detect_color_codec(dir, &options.basename);
    let header = header_from_info(&fields, color_compression, options.depth_compression)?;
    let format = header.format;
    let mut data = SensorData::with_header(header)?;
    let mut summary = ImportSummary {
        bytes_read: info.len() as u64,
        ..ImportSummary::default()
    };

    for index in 0.. {
        if stop.load(Ordering::Relaxed) {
            info!(read = summary.frames_read, "import stopped");
            return Ok((data, summary));
        }
        let Some(files) = FrameFiles::find(dir, &options.basename, index, color_compression) else {
            break;
        };

        let color = Bytes::from(read_file(&files.color)?);
        // size check only, the payload is stored as read
        color_compression.decompress(&color, format.color_width, format.color_height)?;

        let depth = read_depth(&files.depth, format.depth_width, format.depth_height)?;
        let depth_bytes =
            format
                .depth_compression
                .compress(&depth, format.depth_width, format.depth_height)?;
        let pose = load_pose_file(&files.pose)?;

        summary.bytes_read += color.len() as u64 + depth.len() as u64 * 2;
        data.push_frame(RgbdFrame::from_parts(color, depth_bytes, pose, 0, 0));
        summary.frames_read += 1;
        debug!(frame = index, "frame imported");
    }

    if let Some(expected) = fields.get("m_frames.size").and_then(|v| v.parse::<usize>().ok()) {
        if expected != summary.frames_read {
            warn!(
                expected,
                found = summary.frames_read,
                "frame count differs from metadata"
            );
        }
    }

    summary.completed = true;
    observability::record_container_io("import", summary.frames_read as u64, summary.bytes_read);
    info!(
        frames = summary.frames_read,
        bytes = summary.bytes_read,
        "import finished"
    );
    Ok((data, summary))
}

struct FrameFiles {
    color: PathBuf,
    depth: PathBuf,
    pose: PathBuf,
}

impl FrameFiles {
    fn find(dir: &Path, basename: &str, index: usize, color: ColorCompression) -> Option<Self> {
        let stem = format!("{basename}{index:06}");
        let color = dir.join(format!("{stem}.color.{}", color.file_extension()));
        let depth = ["pgm", "png"]
            .iter()
            .map(|ext| dir.join(format!("{stem}.depth.{ext}")))
            .find(|path| path.exists())?;
        let pose = dir.join(format!("{stem}.pose.txt"));
        (color.exists() && pose.exists()).then_some(Self { color, depth, pose })
    }
}

fn detect_color_codec(dir: &Path, basename: &str) -> ColorCompression {
    let jpeg = dir.join(format!(
        "{basename}{:06}.color.{}",
        0,
        ColorCompression::Jpeg.file_extension()
    ));
    if jpeg.exists() {
        ColorCompression::Jpeg
    } else {
        ColorCompression::Png
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ContractError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ContractError::Io(e),
    })
}

/// `key = value` lines; the value keeps inner spaces
fn parse_info(text: &str) -> HashMap<&str, &str> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}

fn header_from_info(
    fields: &HashMap<&str, &str>,
    color_compression: ColorCompression,
    depth_compression: DepthCompression,
) -> Result<ContainerHeader> {
    let field = |key: &str| {
        fields
            .get(key)
            .copied()
            .ok_or_else(|| ContractError::corrupt_stream(format!("_info.txt lacks {key}")))
    };
    let number = |key: &str| -> Result<u32> {
        let value = field(key)?;
        value.parse().map_err(|e| {
            ContractError::corrupt_stream(format!("_info.txt {key} = '{value}': {e}"))
        })
    };
    let matrix = |key: &str| -> Result<Mat4> {
        parse_pose(field(key)?)
            .map_err(|e| ContractError::corrupt_stream(format!("_info.txt {key}: {e}")))
    };

    let version = number("m_versionNumber")?;
    if version != FORMAT_VERSION {
        return Err(ContractError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let shift = field("m_depthShift")?;
    let depth_shift = shift.parse::<f32>().map_err(|e| {
        ContractError::corrupt_stream(format!("_info.txt m_depthShift = '{shift}': {e}"))
    })?;

    let mut calibration_color = CalibrationData::identity();
    calibration_color.set_matrices(
        matrix("m_calibrationColorIntrinsic")?,
        matrix("m_calibrationColorExtrinsic")?,
    );
    let mut calibration_depth = CalibrationData::identity();
    calibration_depth.set_matrices(
        matrix("m_calibrationDepthIntrinsic")?,
        matrix("m_calibrationDepthExtrinsic")?,
    );

    Ok(ContainerHeader::new(
        field("m_sensorName")?,
        FrameFormat::new(
            color_compression,
            depth_compression,
            (number("m_colorWidth")?, number("m_colorHeight")?),
            (number("m_depthWidth")?, number("m_depthHeight")?),
        ),
        calibration_color,
        calibration_depth,
        depth_shift,
    ))
}

fn read_depth(path: &Path, width: u32, height: u32) -> Result<Vec<u16>> {
    let bytes = read_file(path)?;
    let (found_width, found_height, samples) = if path.extension().is_some_and(|e| e == "png") {
        let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
            .map_err(|e| ContractError::corrupt_stream(format!("{}: {e}", path.display())))?
            .into_luma16();
        let (w, h) = image.dimensions();
        (w, h, image.into_raw())
    } else {
        parse_pgm(&bytes)?
    };

    if (found_width, found_height) != (width, height) {
        return Err(ContractError::corrupt_stream(format!(
            "{} is {found_width}x{found_height}, expected {width}x{height}",
            path.display()
        )));
    }
    Ok(samples)
}

/// Binary 16-bit PGM (P5), samples big-endian
fn parse_pgm(bytes: &[u8]) -> Result<(u32, u32, Vec<u16>)> {
    let mut pos = 0;
    if pgm_token(bytes, &mut pos)? != b"P5" {
        return Err(ContractError::corrupt_stream("depth image is not a binary pgm"));
    }
    let mut fields = [0u32; 3];
    for value in &mut fields {
        let token = pgm_token(bytes, &mut pos)?;
        *value = std::str::from_utf8(token)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ContractError::corrupt_stream("invalid pgm header field"))?;
    }
    let [width, height, max_value] = fields;
    if max_value < 256 {
        return Err(ContractError::corrupt_stream(format!(
            "pgm with max value {max_value} is not 16-bit depth"
        )));
    }

    // one whitespace byte ends the header
    let expected = codec::frame_bytes(width, height, 2)?;
    let data = bytes
        .get(pos + 1..)
        .filter(|data| data.len() == expected)
        .ok_or_else(|| {
            ContractError::corrupt_stream(format!(
                "pgm sample data is not {expected} bytes for {width}x{height}"
            ))
        })?;

    let mut samples = vec![0u16; expected / 2];
    BigEndian::read_u16_into(data, &mut samples);
    Ok((width, height, samples))
}

fn pgm_token<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    loop {
        match bytes.get(*pos) {
            Some(b'#') => {
                while bytes.get(*pos).is_some_and(|&c| c != b'\n') {
                    *pos += 1;
                }
            }
            Some(c) if c.is_ascii_whitespace() => *pos += 1,
            Some(_) => break,
            None => return Err(ContractError::corrupt_stream("pgm header ends early")),
        }
    }
    let start = *pos;
    while bytes.get(*pos).is_some_and(|c| !c.is_ascii_whitespace()) {
        *pos += 1;
    }
    Ok(&bytes[start..*pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{export_images, ExportOptions};
    use contracts::{unknown_pose, ImuFrame, Rgb8};

    fn source(color: ColorCompression, frames: usize) -> SensorData {
        let mut data = SensorData::with_header(ContainerHeader::new(
            "PrimeSense Carmine",
            FrameFormat::new(color, DepthCompression::Zlib, (4, 2), (2, 2)),
            CalibrationData::from_pinhole(50.0, 51.0, 2.0, 1.0),
            CalibrationData::new(Mat4::identity() * 2.0, Mat4::identity()),
            1000.0,
        ))
        .unwrap();
        for i in 0..frames {
            let pose = if i == 1 { unknown_pose() } else { Mat4::identity() };
            data.add_frame_with(
                &[Rgb8::new(i as u8 * 20, 7, 9); 8],
                &[i as u16, 1000, 0, u16::MAX],
                pose,
                0,
                0,
            )
            .unwrap();
        }
        data
    }

    #[test]
    fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = source(ColorCompression::Png, 3);
        data.add_imu_frame(ImuFrame::at(5)).unwrap();
        export_images(&data, dir.path(), &ExportOptions::default()).unwrap();

        let options = ImportOptions {
            depth_compression: DepthCompression::Occi,
            ..ImportOptions::default()
        };
        let (imported, summary) =
            import_images_until(dir.path(), &options, &AtomicBool::new(false)).unwrap();
        assert!(summary.completed);
        assert_eq!(summary.frames_read, 3);

        let header = imported.header().unwrap();
        let exported = data.header().unwrap();
        assert_eq!(header.sensor_name, "PrimeSense Carmine");
        assert_eq!(header.calibration_color, exported.calibration_color);
        assert_eq!(header.calibration_depth, exported.calibration_depth);
        assert_eq!(header.depth_shift, 1000.0);
        assert_eq!(header.format.color_compression, ColorCompression::Png);
        assert_eq!(header.format.depth_compression, DepthCompression::Occi);
        assert_eq!(imported.num_imu_frames(), 0);

        for i in 0..3 {
            assert_eq!(
                imported.frame(i).unwrap().color_bytes(),
                data.frame(i).unwrap().color_bytes()
            );
            assert_eq!(
                imported.decompress_depth(i).unwrap(),
                data.decompress_depth(i).unwrap()
            );
        }
        assert!(!imported.frame(1).unwrap().has_pose());
    }

    #[test]
    fn test_jpeg_detected_and_raw_exported_as_png() {
        let dir = tempfile::tempdir().unwrap();
        export_images(&source(ColorCompression::Jpeg, 1), dir.path(), &ExportOptions::default())
            .unwrap();
        let imported = import_images(dir.path(), &ImportOptions::default()).unwrap();
        assert_eq!(imported.format().unwrap().color_compression, ColorCompression::Jpeg);

        let dir = tempfile::tempdir().unwrap();
        let raw = source(ColorCompression::Raw, 2);
        export_images(&raw, dir.path(), &ExportOptions::default()).unwrap();
        let imported = import_images(dir.path(), &ImportOptions::default()).unwrap();
        assert_eq!(imported.format().unwrap().color_compression, ColorCompression::Png);
        assert_eq!(
            imported.decompress_color(1).unwrap(),
            raw.decompress_color(1).unwrap()
        );
    }

    #[test]
    fn test_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        export_images(&source(ColorCompression::Png, 3), dir.path(), &ExportOptions::default())
            .unwrap();
        fs::remove_file(dir.path().join("frame-000001.pose.txt")).unwrap();
        let imported = import_images(dir.path(), &ImportOptions::default()).unwrap();
        assert_eq!(imported.num_frames(), 1);
    }

    #[test]
    fn test_depth_size_checked() {
        let dir = tempfile::tempdir().unwrap();
        export_images(&source(ColorCompression::Png, 1), dir.path(), &ExportOptions::default())
            .unwrap();
        let pgm = dir.path().join("frame-000000.depth.pgm");
        let mut bytes = fs::read(&pgm).unwrap();
        bytes.truncate(bytes.len() - 2);
        fs::write(&pgm, bytes).unwrap();
        assert!(matches!(
            import_images(dir.path(), &ImportOptions::default()),
            Err(ContractError::CorruptStream { .. })
        ));
    }

    #[test]
    fn test_metadata_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            import_images(dir.path(), &ImportOptions::default()),
            Err(ContractError::FileNotFound { .. })
        ));

        export_images(&source(ColorCompression::Png, 1), dir.path(), &ExportOptions::default())
            .unwrap();
        let info = fs::read_to_string(info_path(dir.path())).unwrap();
        fs::write(
            info_path(dir.path()),
            info.replace("m_versionNumber = 4", "m_versionNumber = 3"),
        )
        .unwrap();
        assert!(matches!(
            import_images(dir.path(), &ImportOptions::default()),
            Err(ContractError::VersionMismatch { found: 3, .. })
        ));

        fs::write(info_path(dir.path()), "m_versionNumber = 4\n").unwrap();
        assert!(matches!(
            import_images(dir.path(), &ImportOptions::default()),
            Err(ContractError::CorruptStream { .. })
        ));
    }

    #[test]
    fn test_parse_pgm_with_comments() {
        let mut bytes = b"P5\n# comment\n# another\n2 1\n65535\n".to_vec();
        bytes.extend_from_slice(&[0x01, 0x02, 0xFF, 0xFE]);
        let (w, h, samples) = parse_pgm(&bytes).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(samples, vec![0x0102, 0xFFFE]);

        assert!(parse_pgm(b"P2\n2 1\n65535\n").is_err());
        assert!(parse_pgm(b"P5\n2 1\n255\n\x01\x02").is_err());
    }
}
