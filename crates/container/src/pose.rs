//! Pose text files: four rows of four whitespace separated floats

use std::fs;
use std::path::Path;

use contracts::{mat4_from_row_major, mat4_to_row_major, ContractError, Mat4, Result};

/// Render a pose as four text rows
pub fn format_pose(pose: &Mat4) -> String {
    mat4_to_row_major(pose)
        .chunks(4)
        .map(|row| {
            row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse 16 row-major floats separated by any whitespace
pub fn parse_pose(text: &str) -> Result<Mat4> {
    let values = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f32>().map_err(|e| {
                ContractError::corrupt_stream(format!("invalid pose value '{token}': {e}"))
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    let values: [f32; 16] = values.as_slice().try_into().map_err(|_| {
        ContractError::corrupt_stream(format!("pose needs 16 values, found {}", values.len()))
    })?;
    Ok(mat4_from_row_major(&values))
}

pub fn save_pose_file(path: &Path, pose: &Mat4) -> Result<()> {
    let mut text = format_pose(pose);
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

pub fn load_pose_file(path: &Path) -> Result<Mat4> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ContractError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ContractError::Io(e),
    })?;
    parse_pose(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::unknown_pose;

    #[test]
    fn test_rows_are_row_major() {
        let mut pose = Mat4::identity();
        pose[(0, 3)] = 1.5;
        let text = format_pose(&pose);
        let first = text.lines().next().unwrap();
        assert_eq!(first, "1 0 0 1.5");
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_file_roundtrip_with_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame-000000.pose.txt");
        save_pose_file(&path, &unknown_pose()).unwrap();
        let loaded = load_pose_file(&path).unwrap();
        assert!(contracts::is_unknown_pose(&loaded));

        let mut pose = Mat4::identity();
        pose[(2, 1)] = -0.25;
        save_pose_file(&path, &pose).unwrap();
        assert_eq!(load_pose_file(&path).unwrap(), pose);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_pose("1 2 3"),
            Err(ContractError::CorruptStream { .. })
        ));
        assert!(parse_pose(&"x ".repeat(16)).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_pose_file(&dir.path().join("nope.txt")),
            Err(ContractError::FileNotFound { .. })
        ));
    }
}
