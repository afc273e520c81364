use anyhow::Result;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use postmill::build::{build_site, check_site, BuildReport};
use postmill::config::Config;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let project = Arg::with_name("project")
        .long("project")
        .short("p")
        .takes_value(true)
        .value_name("DIR")
        .help("Directory to start searching for postmill.yaml (defaults to the working directory)");
    let threads = Arg::with_name("threads")
        .long("threads")
        .short("j")
        .takes_value(true)
        .value_name("N")
        .help("Number of worker threads (defaults to the number of CPUs)");

    let matches = App::new("postmill")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds listing pages, tag pages, an Atom feed and a search index from markdown posts")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site and writes it to the output directory")
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .value_name("DIR")
                        .help("Output directory (defaults to `_site` in the project directory)"),
                )
                .arg(project.clone())
                .arg(threads.clone()),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Runs the whole pipeline without writing anything")
                .arg(project)
                .arg(threads),
        )
        .get_matches();

    match matches.subcommand() {
        ("build", Some(matches)) => {
            let config = load_config(matches)?;
            let report = build_site(&config)?;
            print_report(&report)
        }
        ("check", Some(matches)) => {
            let config = load_config(matches)?;
            let report = check_site(&config)?;
            info!("content is valid");
            print_report(&report)
        }
        _ => unreachable!(),
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let threads = match matches.value_of("threads") {
        Some(threads) => Some(threads.parse::<usize>().map_err(|e| {
            anyhow::anyhow!("Invalid value `{}` for --threads: {}", threads, e)
        })?),
        None => None,
    };
    let project = match matches.value_of("project") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let output = match matches.value_of("output") {
        Some(dir) => PathBuf::from(dir),
        None => default_output(&project),
    };
    Config::from_directory(&project, &output, threads)
}

fn default_output(project: &Path) -> PathBuf {
    project.join("_site")
}

fn print_report(report: &BuildReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
