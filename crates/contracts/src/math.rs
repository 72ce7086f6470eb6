//! Matrix and vector aliases shared by every crate.
//!
//! `Mat4` is stored column-major by nalgebra; the container format stores
//! matrices row-major, so conversion always goes through the helpers below.

/// 4x4 single precision matrix (poses, intrinsics, extrinsics)
pub type Mat4 = nalgebra::Matrix4<f32>;

/// 3-vector of doubles (IMU samples)
pub type Vec3d = nalgebra::Vector3<f64>;

/// Flatten a matrix into row-major order
pub fn mat4_to_row_major(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[row * 4 + col] = m[(row, col)];
        }
    }
    out
}

/// Build a matrix from row-major values
pub fn mat4_from_row_major(values: &[f32; 16]) -> Mat4 {
    Mat4::from_row_slice(values)
}

/// Camera-to-world pose marking "pose not available"
pub fn unknown_pose() -> Mat4 {
    Mat4::from_element(f32::NEG_INFINITY)
}

/// True if the pose carries the unknown-pose sentinel
pub fn is_unknown_pose(m: &Mat4) -> bool {
    m[(0, 0)] == f32::NEG_INFINITY
}
