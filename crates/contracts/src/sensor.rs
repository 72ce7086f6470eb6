//! Well-known depth sensor names

/// Structure Sensor (Occipital)
pub const STRUCTURE_SENSOR: &str = "StructureSensor";

/// Microsoft Kinect v1
pub const KINECT_V1: &str = "Kinect.V1";

/// Microsoft Kinect v2
pub const KINECT_V2: &str = "Kinect.V2";

/// PrimeSense Carmine (1.08 / 1.09)
pub const PRIMESENSE_CARMINE: &str = "PrimeSense Carmine";

/// Asus Xtion Pro
pub const ASUS_XTION: &str = "Asus Xtion Pro";

/// Name stored when the capture device is not known
pub const UNKNOWN_SENSOR: &str = "Unknown";
