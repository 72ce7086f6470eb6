//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{ColorCompression, DepthCompression};
use std::path::PathBuf;

/// sens-tool - inspect, export, convert and merge capture-sequence containers
#[derive(Parser, Debug)]
#[command(
    name = "sens-tool",
    author,
    version,
    about = "Capture-sequence container tool",
    long_about = "Reads and writes RGB-D capture containers (format version 4).\n\n\
                  Prints container summaries, exports and imports frames as images, \n\
                  writes point clouds, re-encodes containers with other codecs and \n\
                  merges recordings."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENS_TOOL_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "SENS_TOOL_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "SENS_TOOL_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a container summary
    Info(InfoArgs),

    /// Export frames as color images, depth PGMs and pose files
    Export(ExportArgs),

    /// Build a container from an exported image directory
    Import(ImportArgs),

    /// Write frames as a colored point cloud (binary PLY)
    PointCloud(PointCloudArgs),

    /// Re-encode a container through the read and write caches
    Convert(ConvertArgs),

    /// Append several containers into one
    Merge(MergeArgs),

    /// Validate a capture profile without touching any container
    Validate(ValidateArgs),
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Container file
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every frame with its payload sizes and timestamps
    #[arg(long)]
    pub frames: bool,
}

/// Arguments for the `export` command
#[derive(Parser, Debug, Clone)]
pub struct ExportArgs {
    /// Container file
    pub file: PathBuf,

    /// Output directory (created if missing)
    pub out_dir: PathBuf,

    /// Prefix of every per-frame file
    #[arg(long, default_value = "frame-")]
    pub basename: String,
}

/// Arguments for the `import` command
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// Directory holding `_info.txt` and the per-frame files
    pub in_dir: PathBuf,

    /// Output container
    pub output: PathBuf,

    /// Prefix of every per-frame file
    #[arg(long, default_value = "frame-")]
    pub basename: String,

    /// Depth codec of the output
    #[arg(long, value_enum, default_value = "zlib")]
    pub depth: DepthCodecArg,

    /// Replace the output file instead of picking a new numbered name
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for the `point-cloud` command
#[derive(Parser, Debug)]
pub struct PointCloudArgs {
    /// Container file
    pub file: PathBuf,

    /// Output PLY file
    pub output: PathBuf,

    /// First frame
    #[arg(long, default_value_t = 0)]
    pub from: usize,

    /// End of the frame range, exclusive (defaults to one frame)
    #[arg(long)]
    pub to: Option<usize>,
}

/// Arguments for the `convert` command
#[derive(Parser, Debug, Clone)]
pub struct ConvertArgs {
    /// Input container
    pub input: PathBuf,

    /// Output container
    pub output: PathBuf,

    /// Capture profile (TOML or JSON) for the output header
    #[arg(short, long, env = "SENS_TOOL_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Color codec of the output
    #[arg(long, value_enum)]
    pub color: Option<ColorCodecArg>,

    /// Depth codec of the output
    #[arg(long, value_enum)]
    pub depth: Option<DepthCodecArg>,

    /// Decoded frames buffered ahead of the writer
    #[arg(long)]
    pub read_cache: Option<usize>,

    /// Frames queued for compression
    #[arg(long)]
    pub write_cache: Option<usize>,

    /// Replace the output file instead of picking a new numbered name
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for the `merge` command
#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// Merged output container
    pub output: PathBuf,

    /// Containers to merge, in order
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Merge IMU samples too (they are dropped otherwise)
    #[arg(long)]
    pub with_imu: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Capture profile to validate
    #[arg(default_value = "capture.toml")]
    pub profile: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ColorCodecArg {
    Raw,
    Png,
    Jpeg,
}

impl From<ColorCodecArg> for ColorCompression {
    fn from(arg: ColorCodecArg) -> Self {
        match arg {
            ColorCodecArg::Raw => Self::Raw,
            ColorCodecArg::Png => Self::Png,
            ColorCodecArg::Jpeg => Self::Jpeg,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DepthCodecArg {
    Raw,
    Zlib,
    Occi,
}

impl From<DepthCodecArg> for DepthCompression {
    fn from(arg: DepthCodecArg) -> Self {
        match arg {
            DepthCodecArg::Raw => Self::Raw,
            DepthCodecArg::Zlib => Self::Zlib,
            DepthCodecArg::Occi => Self::Occi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::parse_from([
            "sens-tool", "-v", "convert", "in.sens", "out.sens", "--color", "png", "--depth",
            "occi", "--write-cache", "4",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Convert(args) => {
                assert!(matches!(args.color, Some(ColorCodecArg::Png)));
                assert_eq!(DepthCompression::from(args.depth.unwrap()), DepthCompression::Occi);
                assert_eq!(args.write_cache, Some(4));
                assert!(!args.overwrite);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_import_and_point_cloud() {
        let cli = Cli::parse_from(["sens-tool", "import", "frames", "out.sens", "--depth", "occi"]);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.basename, "frame-");
                assert_eq!(DepthCompression::from(args.depth), DepthCompression::Occi);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli =
            Cli::parse_from(["sens-tool", "point-cloud", "in.sens", "out.ply", "--from", "3"]);
        match cli.command {
            Commands::PointCloud(args) => {
                assert_eq!(args.from, 3);
                assert_eq!(args.to, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_merge_requires_input() {
        assert!(Cli::try_parse_from(["sens-tool", "merge", "out.sens"]).is_err());
        let cli =
            Cli::try_parse_from(["sens-tool", "merge", "out.sens", "a.sens", "b.sens"]).unwrap();
        match cli.command {
            Commands::Merge(args) => assert_eq!(args.inputs.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
