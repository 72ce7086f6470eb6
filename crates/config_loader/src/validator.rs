//! Profile validation
//!
//! Rules:
//! - sensor name not empty
//! - depth shift finite and non-zero
//! - all dimensions non-zero
//! - intrinsics finite, focal lengths non-zero
//! - extrinsics exactly 16 finite values
//! - cache capacities at least 1

use contracts::ContractError;

use crate::profile::{CaptureProfile, Intrinsics};

/// Return the first violated rule, or Ok(())
pub fn validate(profile: &CaptureProfile) -> Result<(), ContractError> {
    validate_sensor(profile)?;
    validate_stream(
        "color",
        profile.color.width,
        profile.color.height,
        profile.color.intrinsics.as_ref(),
        profile.color.extrinsic.as_deref(),
    )?;
    validate_stream(
        "depth",
        profile.depth.width,
        profile.depth.height,
        profile.depth.intrinsics.as_ref(),
        profile.depth.extrinsic.as_deref(),
    )?;
    validate_cache(profile)?;
    Ok(())
}

fn validate_sensor(profile: &CaptureProfile) -> Result<(), ContractError> {
    if profile.sensor_name.trim().is_empty() {
        return Err(ContractError::invalid_config(
            "sensor_name",
            "sensor name cannot be empty",
        ));
    }
    if !profile.depth_shift.is_finite() || profile.depth_shift == 0.0 {
        return Err(ContractError::invalid_config(
            "depth_shift",
            format!("must be finite and non-zero, got {}", profile.depth_shift),
        ));
    }
    Ok(())
}

fn validate_stream(
    stream: &str,
    width: u32,
    height: u32,
    intrinsics: Option<&Intrinsics>,
    extrinsic: Option<&[f32]>,
) -> Result<(), ContractError> {
    if width == 0 || height == 0 {
        return Err(ContractError::invalid_config(
            format!("{stream}.width / {stream}.height"),
            format!("dimensions must be non-zero, got {width}x{height}"),
        ));
    }

    if let Some(k) = intrinsics {
        let values = [k.fx, k.fy, k.mx, k.my];
        if values.iter().any(|v| !v.is_finite()) || k.fx == 0.0 || k.fy == 0.0 {
            return Err(ContractError::invalid_config(
                format!("{stream}.intrinsics"),
                format!("focal lengths must be non-zero and all values finite, got {k:?}"),
            ));
        }
    }

    if let Some(values) = extrinsic {
        if values.len() != 16 {
            return Err(ContractError::invalid_config(
                format!("{stream}.extrinsic"),
                format!("expected 16 values, got {}", values.len()),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ContractError::invalid_config(
                format!("{stream}.extrinsic"),
                "values must be finite",
            ));
        }
    }
    Ok(())
}

fn validate_cache(profile: &CaptureProfile) -> Result<(), ContractError> {
    if profile.cache.read_capacity == 0 {
        return Err(ContractError::invalid_config(
            "cache.read_capacity",
            "must be at least 1",
        ));
    }
    if profile.cache.write_capacity == 0 {
        return Err(ContractError::invalid_config(
            "cache.write_capacity",
            "must be at least 1",
        ));
    }
    Ok(())
}
