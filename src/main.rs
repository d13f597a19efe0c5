use clap::{App, Arg, ArgMatches};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::process;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wsi::{Error, ParseError, Source, Vm};

fn args() -> ArgMatches {
    App::new("wsi")
        .about("a whitespace interpreter")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .takes_value(true)
                .required(false)
                .help("whitespace source file to interpret, read from stdin when omitted"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .takes_value(true)
                .required(false)
                .help("file read by readchar and readnum, stdin when omitted"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .takes_value(false)
                .required(false)
                .help("logs decoding and execution progress to stderr"),
        )
        .get_matches()
}

fn init_logging(verbose: bool) {
    let default = if verbose { "wsi=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &ArgMatches) -> Result<(), Error> {
    let start = Instant::now();
    let source = match args.value_of("file") {
        Some(file_name) => Source::from_file(file_name)?,
        None => Source::from_reader(io::stdin().lock())?,
    };
    let mut vm = Vm::from_source(&source)?;
    info!(
        instructions = vm.instructions().len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "decoded source"
    );

    let mut input: Box<dyn BufRead> = match args.value_of("input") {
        Some(path) => {
            let file = File::open(path).map_err(|source| ParseError::FileOpen {
                path: path.into(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());

    let start = Instant::now();
    vm.run(&mut input, &mut output)?;
    info!(
        elapsed_us = start.elapsed().as_micros() as u64,
        "execution finished"
    );

    Ok(())
}

fn main() {
    let args = args();
    init_logging(args.is_present("verbose"));

    if let Err(err) = run(&args) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
