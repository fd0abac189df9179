mod logging;
mod runner;
mod search;

use clap::{arg, value_parser, ArgMatches, Command};
use std::path::PathBuf;
use std::process;

use runner::{Batch, OutputKind};

fn cli() -> Command {
    Command::new("variant-crawler")
        .about("Local CodeQL variant analysis across many repositories")
        .subcommand_required(true)
        .arg_required_else_help(true)
        // Discover repositories
        .subcommand(
            Command::new("search")
                .about("Discover repositories with a Sourcegraph search")
                .arg(arg!(--query <QUERY> "Sourcegraph search query")
                     .required(true))
                .arg(arg!(--count <N> "Max number of repos to retrieve")
                     .value_parser(value_parser!(usize))
                     .default_value("500"))
                .arg(arg!(--output <FILE> "Output file for discovered repos")
                     .value_parser(value_parser!(PathBuf))
                     .default_value("repos.txt"))
        )
        // Evaluate a query, keeping the raw result sets
        .subcommand(
            Command::new("query")
                .about("Run a query against every repository (raw result sets)")
                .arg(arg!(repo_file: <REPO_FILE> "File containing org/repo list")
                     .value_parser(value_parser!(PathBuf)))
                .arg(arg!(language: <LANGUAGE> "CodeQL language (e.g. cpp, java, go, javascript)"))
                .arg(arg!(query: <QUERY> "Path to CodeQL query (e.g. UnsafeDeserialization.ql)")
                     .value_parser(value_parser!(PathBuf)))
                .arg(arg!(--root <DIR> "Root directory for analysis")
                     .value_parser(value_parser!(PathBuf))
                     .default_value("VariantAnalysisRoot"))
        )
        // Analyze every repository, one at a time
        .subcommand(
            Command::new("analyze")
                .about("Analyze every repository (SARIF output)")
                .arg(arg!(repo_file: <REPO_FILE> "File containing org/repo list")
                     .value_parser(value_parser!(PathBuf)))
                .arg(arg!(language: <LANGUAGE> "CodeQL language (e.g. cpp, java, go, javascript)"))
                .arg(arg!(query: <QUERY> "Path to CodeQL query or query pack")
                     .value_parser(value_parser!(PathBuf)))
                .arg(arg!(--root <DIR> "Root directory for analysis")
                     .value_parser(value_parser!(PathBuf))
                     .default_value("VariantAnalysisRoot"))
                .arg(arg!(--"sarif-format" <FORMAT> "SARIF format version")
                     .default_value("sarifv2.1.0"))
        )
        // Analyze every repository in parallel
        .subcommand(
            Command::new("crawl")
                .about("Analyze every repository on a worker pool (SARIF output)")
                .arg(arg!(repo_file: <REPO_FILE> "File containing org/repo list")
                     .value_parser(value_parser!(PathBuf)))
                .arg(arg!(language: <LANGUAGE> "CodeQL language (e.g. cpp, java, go, javascript)"))
                .arg(arg!(query: <QUERY> "Path to CodeQL query or query pack")
                     .value_parser(value_parser!(PathBuf)))
                .arg(arg!(--root <DIR> "Root directory for analysis")
                     .value_parser(value_parser!(PathBuf))
                     .default_value("VariantAnalysisRoot"))
                .arg(arg!(--"sarif-format" <FORMAT> "SARIF format version")
                     .default_value("sarifv2.1.0"))
                .arg(arg!(--workers <N> "Number of parallel workers (default: cpu count / 2)")
                     .value_parser(value_parser!(usize)))
        )
}

fn get_path(args: &ArgMatches, name: &str) -> PathBuf {
    args.get_one::<PathBuf>(name)
        .expect("required")
        .to_path_buf()
}

fn get_string(args: &ArgMatches, name: &str) -> String {
    args.get_one::<String>(name)
        .expect("required")
        .clone()
}

/// One worker per two processing units, and always at least one.
fn default_workers() -> usize {
    return std::cmp::max(1, num_cpus::get() / 2);
}

/// Run a batch subcommand: pre-flight the run root, the query path, and the
/// repo list, then hand the batch to the requested driver.
fn run_batch_command(
    sub: &ArgMatches,
    output: OutputKind,
    workers: Option<usize>,
) -> Result<(), String> {
    let repo_file = get_path(sub, "repo_file");
    let language = get_string(sub, "language");
    let query = get_path(sub, "query");
    let root = get_path(sub, "root");

    logging::init(Some(&root.join("logs")));

    let batch = Batch::new(&root, language, &query, output)?;
    let repos = runner::load_repo_list(&repo_file)?;

    match workers {
        Some(n) => runner::run_all(&batch, &repos, n),
        None => runner::run_batch(&batch, &repos),
    }
    return Ok(());
}

fn main() {
    // Parse arguments
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("search", sub)) => {
            logging::init(None);
            let query = get_string(sub, "query");
            let count = *sub.get_one::<usize>("count").expect("defaulted");
            search::discover(&query, count, &get_path(sub, "output"))
        },
        Some(("query", sub)) => {
            run_batch_command(sub, OutputKind::Raw, None)
        },
        Some(("analyze", sub)) => {
            let format = get_string(sub, "sarif-format");
            run_batch_command(sub, OutputKind::Sarif { format }, None)
        },
        Some(("crawl", sub)) => {
            let format = get_string(sub, "sarif-format");
            let workers = sub.get_one::<usize>("workers")
                .copied()
                .unwrap_or_else(default_workers);
            run_batch_command(sub, OutputKind::Sarif { format }, Some(workers))
        },
        _ => unreachable!(),
    };

    if let Err(e) = result {
        println!("[!] {}", e);
        process::exit(1);
    }
}
