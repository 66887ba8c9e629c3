use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};
use colored::Colorize;
use datagen::{
    api,
    config::{ConfigFile, GeneratorConfig},
    preview,
};
use log::LevelFilter;
use std::{path::PathBuf, time::Duration};

/// Pause after each diagnostic event when `--debug` is on.
const DEBUG_PACING: Duration = Duration::from_millis(250);

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("generate")
                .about("Clears the root directory and fills it with a random tree")
                .arg(
                    Arg::new("dir-depth")
                        .short('d')
                        .long("dir-depth")
                        .help("maximum directory depth to create (>= 3)")
                        .value_parser(value_parser!(usize))
                        .required_unless_present("config"),
                )
                .arg(
                    Arg::new("dir-width")
                        .short('w')
                        .long("dir-width")
                        .help("number of entries per directory to create (>= 2)")
                        .value_parser(value_parser!(usize))
                        .required_unless_present("config"),
                )
                .arg(
                    Arg::new("root-dir")
                        .short('r')
                        .long("root-dir")
                        .help("data root path from current location")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("dataroot"),
                )
                .arg(
                    Arg::new("debug")
                        .short('x')
                        .long("debug")
                        .help("Debug logging with diagnostic pacing")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("seed for a reproducible tree shape")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("TOML file with generator settings; flags take precedence")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .help("print the generated tree")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("keep")
                        .long("keep")
                        .help("do not clear the root; fail if it is not empty")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Summarizes an existing tree and optionally checks its shape")
                .arg(
                    Arg::new("root")
                        .help("root of the tree to inspect")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("dir-depth")
                        .short('d')
                        .long("dir-depth")
                        .help("expected maximum directory depth")
                        .value_parser(value_parser!(usize))
                        .requires("dir-width"),
                )
                .arg(
                    Arg::new("dir-width")
                        .short('w')
                        .long("dir-width")
                        .help("expected entries per directory")
                        .value_parser(value_parser!(usize))
                        .requires("dir-depth"),
                )
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .help("print the tree")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    let is_verbose = matches.get_flag("verbose");

    match matches.subcommand() {
        Some(("generate", args)) => handle_generate(args, is_verbose),
        Some(("inspect", args)) => handle_inspect(args, is_verbose),
        _ => unreachable!(),
    }
}

fn init_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn handle_generate(args: &ArgMatches, is_verbose: bool) -> miette::Result<()> {
    let is_debug = args.get_flag("debug");

    init_logger(is_verbose || is_debug);

    let mut config = GeneratorConfig::new(0, 0);

    if let Some(path) = args.get_one::<PathBuf>("config") {
        config = config.merge_file(&ConfigFile::from_file(path)?);
    }
    if let Some(depth) = args.get_one::<usize>("dir-depth") {
        config.max_depth = *depth;
    }
    if let Some(width) = args.get_one::<usize>("dir-width") {
        config.entry_count = *width;
    }
    if let Some(seed) = args.get_one::<u64>("seed") {
        config = config.with_seed(*seed);
    }
    if is_debug {
        config = config.with_pacing(DEBUG_PACING);
    }

    let root = args
        .get_one::<PathBuf>("root-dir")
        .expect("root-dir has a default");

    let generation = api::generate(config, root, args.get_flag("keep"))?;

    if args.get_flag("tree") {
        preview::print_tree(&generation.root)?;
    }

    let report = &generation.report;
    println!("{} {}", "generated".green(), generation.root.display());
    println!("{} directories, {} files", report.directories, report.files);
    if report.skipped > 0 {
        println!(
            "{} {} entries skipped on name collisions",
            "warn".yellow(),
            report.skipped
        );
    }

    Ok(())
}

fn handle_inspect(args: &ArgMatches, is_verbose: bool) -> miette::Result<()> {
    init_logger(is_verbose);

    let root = args.get_one::<PathBuf>("root").expect("root required");

    let expected = match (
        args.get_one::<usize>("dir-depth"),
        args.get_one::<usize>("dir-width"),
    ) {
        (Some(depth), Some(width)) => Some((*depth, *width)),
        _ => None,
    };

    let inspection = api::inspect(root, expected)?;

    if args.get_flag("tree") {
        preview::print_tree(root)?;
    }

    let survey = &inspection.survey;
    println!(
        "{} directories, {} files, max depth {}",
        survey.directories, survey.files, survey.max_depth
    );
    for (depth, census) in &survey.per_depth {
        println!(
            "  depth {}: {} directories, {} files",
            depth, census.directories, census.files
        );
    }

    if inspection.violations.is_empty() {
        if expected.is_some() {
            println!("{}", "ok".green());
        }
        return Ok(());
    }

    for violation in &inspection.violations {
        println!("{} {}", "violation".red(), violation);
    }

    Err(api::DatagenError::Violations {
        count: inspection.violations.len(),
    }
    .into())
}
