//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{CaptureProfile, ConfigLoader};
use contracts::{ColorCompression, DepthCompression};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    profile_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ProfileSummary>,
}

#[derive(Serialize)]
struct ProfileSummary {
    sensor_name: String,
    color: String,
    depth: String,
    depth_shift: f32,
    read_capacity: usize,
    write_capacity: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(profile = %args.profile.display(), "Validating capture profile");

    let result = validate_profile(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Capture profile validation failed")
    }
}

fn validate_profile(args: &ValidateArgs) -> ValidationResult {
    let profile_path = args.profile.display().to_string();

    match ConfigLoader::load_from_path(&args.profile) {
        Ok(profile) => {
            let warnings = collect_warnings(&profile);
            ValidationResult {
                valid: true,
                profile_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ProfileSummary {
                    sensor_name: profile.sensor_name.clone(),
                    color: format!(
                        "{}x{} {}",
                        profile.color.width,
                        profile.color.height,
                        profile.color.compression.name()
                    ),
                    depth: format!(
                        "{}x{} {}",
                        profile.depth.width,
                        profile.depth.height,
                        profile.depth.compression.name()
                    ),
                    depth_shift: profile.depth_shift,
                    read_capacity: profile.cache.read_capacity,
                    write_capacity: profile.cache.write_capacity,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            profile_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect non-fatal issues
fn collect_warnings(profile: &CaptureProfile) -> Vec<String> {
    let mut warnings = Vec::new();

    if profile.color.compression == ColorCompression::Jpeg {
        warnings.push("color.compression = jpeg is lossy".to_string());
    }
    if profile.depth.compression == DepthCompression::Raw {
        warnings.push("depth.compression = raw stores depth uncompressed".to_string());
    }
    if profile.depth_shift < 0.0 {
        warnings.push(format!(
            "depth_shift is negative ({}), depth in meters will be negative",
            profile.depth_shift
        ));
    }
    if profile.color.intrinsics.is_none() {
        warnings.push("color.intrinsics not set, identity is stored".to_string());
    }
    if profile.depth.intrinsics.is_none() {
        warnings.push("depth.intrinsics not set, identity is stored".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Capture profile is valid: {}", result.profile_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sensor: {}", summary.sensor_name);
            println!("  Color: {}", summary.color);
            println!("  Depth: {}", summary.depth);
            println!("  Depth shift: {}", summary.depth_shift);
            println!(
                "  Cache capacity: read {}, write {}",
                summary.read_capacity, summary.write_capacity
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Capture profile is invalid: {}", result.profile_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.toml");
        std::fs::write(
            &path,
            "[color]\nwidth = 640\nheight = 480\n\
             [depth]\nwidth = 640\nheight = 480\ncompression = \"raw\"\n",
        )
        .unwrap();

        let result = validate_profile(&ValidateArgs {
            profile: path,
            json: true,
        });
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("jpeg")));
        assert!(warnings.iter().any(|w| w.contains("depth.compression")));
    }

    #[test]
    fn test_validate_missing_profile() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_profile(&ValidateArgs {
            profile: dir.path().join("missing.toml"),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("missing.toml"));
    }
}
