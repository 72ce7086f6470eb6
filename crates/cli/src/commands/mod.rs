//! Command implementations.

mod convert;
mod export;
mod import;
mod info;
mod merge;
mod point_cloud;
mod validate;

pub use convert::run_convert;
pub use export::run_export;
pub use import::run_import;
pub use info::run_info;
pub use merge::run_merge;
pub use point_cloud::run_point_cloud;
pub use validate::run_validate;
