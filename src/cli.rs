use clap::Parser;
use std::path::PathBuf;

// Build version with codec info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Codecs: image 0.25 (PNG, JPEG, TIFF, TGA, BMP, GIF, WebP)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Multi-panel image viewer with magnifier panes
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Image file or directory to open
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Write every rendered panel as <DIR>/<panel>.png
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Images decoded ahead in the browsing direction (overrides settings)
    #[arg(long = "prefetch", value_name = "N")]
    pub prefetch: Option<usize>,

    /// Enable debug logging to file (default: tripane.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
