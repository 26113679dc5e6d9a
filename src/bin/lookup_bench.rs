//! Replay query files against the lookup structures and compare timings.
//!
//! ```text
//! lookup-bench generate -n 100000 --seed 7 -o data/test1.in
//! lookup-bench run data/test1.in --structures avl,rb,hash --dump out.txt
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use lookup_trees::config::{DEFAULT_CAPACITY, DEFAULT_GROWTH_RATIO, DEFAULT_LOAD_FACTOR};
use lookup_trees::harness::{self, HarnessError, HashKind, Pattern, RunReport, Structure};
use lookup_trees::logging::init_logger_with;
use lookup_trees::HashTableConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(name = "lookup-bench")]
#[command(about = "Compare AVL, red-black and bucket hash table lookups on query files")]
struct Args {
    /// Log at debug level (shows every rehash)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a query file against one or more structures
    Run {
        /// Query file: a count line followed by `opcode operands` records
        path: PathBuf,

        /// Data structures to test (comma-separated or multiple flags)
        #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = vec![
            Structure::Avl,
            Structure::Rb,
            Structure::Hash,
        ])]
        structures: Vec<Structure>,

        /// Hash function for the bucket table
        #[arg(long, value_enum, default_value_t = HashKind::Multiplicative)]
        hash: HashKind,

        /// Initial bucket count of the hash table
        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// Load factor above which the hash table grows
        #[arg(long, default_value_t = DEFAULT_LOAD_FACTOR)]
        load_factor: f64,

        /// Write in-order traversals to this file
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Write a random query file
    Generate {
        /// Number of initial inserts; the file holds twice as many queries
        #[arg(short, default_value_t = 100_000)]
        n: usize,

        #[arg(long, value_enum, default_value_t = Pattern::Mixed)]
        pattern: Pattern,

        /// Seed for a reproducible stream; random when omitted
        #[arg(long)]
        seed: Option<u64>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn print_table_header(path: &Path, queries: usize) {
    println!("Input: {}", path.display());
    println!("Loaded {queries} queries");
    println!();
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>12} {:>12}",
        "Structure", "Queries", "Errors", "Hits", "Final", "Elapsed ms", "Queries/s"
    );
    println!("{}", "─".repeat(80));
}

fn print_report(report: &RunReport) {
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>12.2} {:>12.0}",
        report.structure,
        report.queries,
        report.errors,
        report.hits,
        report.final_len,
        report.elapsed.as_secs_f64() * 1e3,
        report.queries_per_sec()
    );
}

fn run(
    path: PathBuf,
    structures: &[Structure],
    hash: HashKind,
    config: HashTableConfig,
    dump: Option<PathBuf>,
) -> Result<(), HarnessError> {
    config.validate()?;

    info!("loading queries from {}", path.display());
    let queries = harness::parse_queries(BufReader::new(File::open(&path)?))?;

    let mut dump = match dump {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    print_table_header(&path, queries.len());
    for &structure in structures {
        let out = dump.as_mut().map(|w| w as &mut dyn Write);
        let report = harness::run_structure(structure, hash, &config, &queries, out)?;
        print_report(&report);
    }
    println!("{}", "─".repeat(80));

    if let Some(mut w) = dump {
        w.flush()?;
    }
    Ok(())
}

fn generate(n: usize, pattern: Pattern, seed: Option<u64>, output: PathBuf) -> Result<(), HarnessError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let queries = harness::generate(pattern, &mut rng, n);
    harness::write_queries(BufWriter::new(File::create(&output)?), &queries)?;
    info!("wrote {} queries to {}", queries.len(), output.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger_with(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let result = match args.command {
        Command::Run {
            path,
            structures,
            hash,
            capacity,
            load_factor,
            dump,
        } => {
            let config = HashTableConfig {
                initial_capacity: capacity,
                load_factor,
                growth_ratio: DEFAULT_GROWTH_RATIO,
            };
            run(path, &structures, hash, config, dump)
        }
        Command::Generate {
            n,
            pattern,
            seed,
            output,
        } => generate(n, pattern, seed, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
