use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "streamzip")]
#[command(version)]
#[command(about = "List, test and extract ZIP archives from files or HTTP URLs", long_about = None)]
#[command(after_help = "Examples:\n  \
  streamzip data1.zip -x joe        extract all files except joe from data1.zip\n  \
  streamzip -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  streamzip -t archive.zip          verify every entry's CRC-32\n  \
  streamzip -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Test archive entries (decompress and check CRC-32)
    #[arg(short = 't')]
    pub test: bool,

    /// Display archive comment
    #[arg(short = 'z')]
    pub comment: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Decode entry extra fields and comments only when needed
    #[arg(long)]
    pub lazy: bool,

    /// Encoding of entry names and comments
    #[arg(long, value_name = "LABEL", default_value = "utf-8")]
    pub encoding: String,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet > 0 { "error" } else { "warn" }
    }
}
