//! pdkernel CLI
//!
//! Computes the kernel matrix between 2 lists of DIPHA persistence diagrams.
//!
//! ```text
//! pdkernel -s 1.0 -f 10 -d 1 left.txt right.txt -o kernel.txt
//! pdkernel --list
//! pdkernel generate -n 100 --degree 1 pd.dipha
//! ```

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use pdkernel::app;
use pdkernel::{
    HostPlatform, KernelKind, OutputTarget, Precision, RunOptions, TileRequest, UnitSelection,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

/// the environment variable that overrides the log filter
const LOG_ENV: &str = "PDKERNEL_LOG";

/// Kernel matrices between persistence diagrams
#[derive(Parser)]
#[command(name = "pdkernel")]
#[command(version)]
#[command(about = "Computes kernel matrices between lists of persistence diagrams")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// List the available execution units and exit
    #[arg(short, long)]
    list: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a random persistence diagram
    Generate(GenerateArgs),
}

#[derive(Args)]
struct RunArgs {
    /// The kernel: heat (also pssk) or pwgk
    #[arg(short, long, default_value = "heat")]
    kernel: KernelKind,

    /// Value of sigma (positive)
    #[arg(short, long)]
    sigma: Option<f64>,

    /// Exponent of the persistence weight (pwgk only)
    #[arg(long)]
    power: Option<f64>,

    /// Scale of the persistence weight (pwgk only)
    #[arg(long)]
    weight: Option<f64>,

    /// Make essential intervals die here
    #[arg(short, long, allow_negative_numbers = true)]
    finitization: Option<f64>,

    /// Read this degree from the diagram files
    #[arg(short, long)]
    degree: Option<u32>,

    /// Tiling shape: "auto" ("max"), or 2 positive integers like "1,256"
    #[arg(long, default_value = "auto")]
    workshape: TileRequest,

    /// Compute in double precision (the default is single precision)
    #[arg(long, alias = "64")]
    double: bool,

    /// Number of host execution units [default: one per hardware thread]
    #[arg(long)]
    units: Option<NonZeroUsize>,

    /// Use these execution units: "all" or ids and inclusive ranges like
    /// "0,2-3"
    #[arg(long, default_value = "all")]
    devices: String,

    /// Output file ("-" for standard output)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Text files listing the left and right diagrams, one path per line.
    /// Passing the same file twice computes only half of the matrix.
    #[arg(num_args = 0..=2)]
    file_lists: Vec<PathBuf>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Number of intervals
    #[arg(short)]
    n: usize,

    /// Degree of the intervals
    #[arg(long, default_value_t = 0)]
    degree: u32,

    /// Probability that an interval is essential
    #[arg(short, default_value_t = 0.1)]
    p: f64,

    /// Seed of the random number generator
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output file
    output: PathBuf,
}

impl RunArgs {
    fn into_options(self) -> anyhow::Result<RunOptions> {
        let Some(sigma) = self.sigma else {
            bail!("sigma is required (--sigma)");
        };
        let Some(finitization) = self.finitization else {
            bail!("the finitization is required (--finitization)");
        };
        let Some(degree) = self.degree else {
            bail!("a degree is required for DIPHA diagram files (--degree)");
        };
        let [left, right]: [PathBuf; 2] = self.file_lists.try_into().map_err(|_| {
            anyhow::anyhow!(
                "2 file lists are required (or the same one twice) containing the diagram files to consider"
            )
        })?;

        let kernel = self.kernel.spec(sigma, self.power, self.weight)?;
        let mut opts = RunOptions::new(kernel, finitization, degree, [left, right]);
        opts.tile = self.workshape;
        opts.precision = if self.double {
            Precision::Double
        } else {
            Precision::Single
        };
        opts.n_units = self.units;
        opts.selection = UnitSelection::parse(&self.devices)?;
        opts.output = OutputTarget::from_arg(&self.output);
        opts.validate()?;
        Ok(opts)
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn list_units(n_units: Option<NonZeroUsize>) {
    let platform = match n_units {
        Some(n) => HostPlatform::new(n),
        None => HostPlatform::detect(),
    };
    println!("Platform 0: {}", platform.name());
    for (id, name) in platform.unit_names().iter().enumerate() {
        println!("  Unit {id}: {name}");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Generate(args)) = cli.command {
        app::generate(&args.output, args.n, args.degree, args.p, args.seed)
            .with_context(|| format!("generating {}", args.output.display()))?;
        return Ok(());
    }

    if cli.list {
        list_units(cli.run.units);
        return Ok(());
    }

    let opts = cli.run.into_options()?;
    let summary = app::execute(&opts).context("computing the kernel matrix")?;
    tracing::info!(
        shape = ?summary.shape,
        computed = summary.computed_cells,
        units = summary.n_units,
        "done"
    );
    Ok(())
}
