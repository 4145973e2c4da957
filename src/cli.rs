use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "attune")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Compile a configuration script and reconcile this machine against it",
    long_about = "Compile a configuration script into a resource catalog and reconcile this \
                  machine against it.\n\nPrints exactly one line on stdout: conformed, changes \
                  or failures. The run report goes to stderr."
)]
pub struct Cli {
    /// Mode: `run` converges drift, `observe` only reports it
    pub mode: String,

    /// Script text; `-` reads stdin
    #[arg(conflicts_with = "manifest")]
    pub script: Option<String>,

    /// Read the script from a file
    #[arg(short = 'f', long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Module directory (repeatable); overrides the configured module path
    #[arg(short = 'M', long = "modulepath", value_name = "DIR")]
    pub modulepath: Vec<PathBuf>,

    /// Node identity
    #[arg(short, long, env = "ATTUNE_NODE")]
    pub node: Option<String>,

    /// External facts file (.json or .toml), merged over collected facts
    #[arg(long, value_name = "PATH")]
    pub facts: Option<PathBuf>,

    /// Working area; a temporary directory removed afterwards by default
    #[arg(short, long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Report format on stderr
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub report_format: ReportFormat,

    /// Do not read or write sync history
    #[arg(long)]
    pub no_history: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Human,
}
