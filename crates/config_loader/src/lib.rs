//! # Config Loader
//!
//! Capture profile loading and validation.
//!
//! Responsibilities:
//! - Parse TOML/JSON profile files
//! - Validate parameter ranges
//! - Build a configured `SensorData` from a profile
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let profile = ConfigLoader::load_from_path(Path::new("capture.toml")).unwrap();
//! let data = profile.to_sensor_data().unwrap();
//! println!("{data}");
//! ```

mod parser;
mod profile;
mod validator;

pub use parser::ConfigFormat;
pub use profile::{CacheProfile, CaptureProfile, ColorStream, DepthStream, Intrinsics};

use contracts::ContractError;
use std::path::Path;
use tracing::debug;

/// Profile loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a profile from file, format chosen by extension (.toml / .json)
    ///
    /// # Errors
    /// - `FileNotFound` if the file does not exist
    /// - `ConfigParse` for unsupported extensions or malformed content
    /// - `InvalidConfig` for out-of-range values
    pub fn load_from_path(path: &Path) -> Result<CaptureProfile, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let profile = Self::load_from_str(&content, format)?;
        debug!(path = %path.display(), sensor = %profile.sensor_name, "capture profile loaded");
        Ok(profile)
    }

    /// Parse and validate a profile
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CaptureProfile, ContractError> {
        let profile = parser::parse(content, format)?;
        validator::validate(&profile)?;
        Ok(profile)
    }

    /// Check an already built profile
    pub fn validate(profile: &CaptureProfile) -> Result<(), ContractError> {
        validator::validate(profile)
    }

    pub fn to_toml(profile: &CaptureProfile) -> Result<String, ContractError> {
        toml::to_string_pretty(profile)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(profile: &CaptureProfile) -> Result<String, ContractError> {
        serde_json::to_string_pretty(profile)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ContractError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ContractError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ColorCompression, DepthCompression};

    const PROFILE_TOML: &str = r#"
sensor_name = "StructureSensor"
depth_shift = 1000.0

[color]
width = 640
height = 480
compression = "jpeg"
intrinsics = { fx = 578.0, fy = 578.0, mx = 320.0, my = 240.0 }

[depth]
width = 640
height = 480
compression = "zlib"
extrinsic = [1.0, 0.0, 0.0, 0.025, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]

[cache]
read_capacity = 8
write_capacity = 16
"#;

    #[test]
    fn test_load_from_str_toml() {
        let profile = ConfigLoader::load_from_str(PROFILE_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(profile.color.compression, ColorCompression::Jpeg);
        assert_eq!(profile.depth.compression, DepthCompression::Zlib);
        assert_eq!(profile.cache.write_capacity, 16);

        let data = profile.to_sensor_data().unwrap();
        let header = data.header().unwrap();
        assert_eq!(header.calibration_depth.extrinsic[(0, 3)], 0.025);
        assert_eq!(header.calibration_color.intrinsic[(0, 2)], 320.0);
    }

    #[test]
    fn test_round_trip_toml() {
        let profile = ConfigLoader::load_from_str(PROFILE_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&profile).unwrap();
        let back = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(profile, back);
    }

    #[test]
    fn test_round_trip_json() {
        let profile = ConfigLoader::load_from_str(PROFILE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&profile).unwrap();
        let back = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(profile, back);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = PROFILE_TOML.replace("read_capacity = 8", "read_capacity = 0");
        let err = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("cache.read_capacity"));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.toml");
        std::fs::write(&path, PROFILE_TOML).unwrap();
        let profile = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(profile.sensor_name, "StructureSensor");

        assert!(matches!(
            ConfigLoader::load_from_path(&dir.path().join("missing.toml")),
            Err(ContractError::FileNotFound { .. })
        ));
        assert!(matches!(
            ConfigLoader::load_from_path(&dir.path().join("capture.yaml")),
            Err(ContractError::ConfigParse { .. })
        ));
    }
}
