use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scriptc::{driver, RunConfig};

#[derive(Debug, Parser)]
#[command(
    name = "scriptc",
    version,
    about = "Compile a .t script to native code",
    long_about = None
)]
struct Cli {
    /// Output file; the extension picks object, library or executable
    #[arg(short = 'o', long = "output", value_name = "OUT")]
    output: Option<PathBuf>,

    /// Add a C include directory
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Add a library search directory
    #[arg(short = 'L', long = "lib-dir", value_name = "DIR")]
    lib_dirs: Vec<PathBuf>,

    /// Link against a library
    #[arg(short = 'l', long = "lib", value_name = "NAME")]
    libs: Vec<String>,

    /// Add a module search directory
    #[arg(short = 'M', long = "module-dir", value_name = "DIR")]
    module_dirs: Vec<PathBuf>,

    /// Do not search the built-in module directories
    #[arg(long)]
    no_default_module_dirs: bool,

    /// Write a Ninja-compatible depfile listing every module read
    #[arg(short = 'D', long = "depfile", value_name = "DEPFILE")]
    depfile: Option<PathBuf>,

    /// Make every depfile path relative to this directory
    #[arg(short = 'P', long = "depfile-root", value_name = "ROOT")]
    depfile_root: Option<PathBuf>,

    /// Increase verbosity (up to -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Emit unoptimized code
    #[arg(short = 'g', long = "debug")]
    debug: bool,

    /// Entry script
    #[arg(value_name = "FILE")]
    filename: PathBuf,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            filename: self.filename,
            output: self.output,
            depfile: self.depfile,
            depfile_root: self.depfile_root,
            include_dirs: self.include_dirs,
            lib_dirs: self.lib_dirs,
            libs: self.libs,
            module_dirs: self.module_dirs,
            no_default_module_dirs: self.no_default_module_dirs,
            debug: self.debug,
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_env_filter(filter)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.into_config();

    for dir in &config.include_dirs {
        info!("include directory: {}", dir.display());
    }
    for dir in &config.lib_dirs {
        info!("library directory: {}", dir.display());
    }

    let code = match driver::run(&config) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("scriptc: {}", err);
            err.exit_code()
        }
    };
    process::exit(code);
}
