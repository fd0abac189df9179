mod analyze;
mod db;
pub mod git;
mod run;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{error, info};

use git::Repo;
pub use run::run_all;

// =============================================================================
// Run root
// =============================================================================

/// The three cache namespaces under one analysis root. Each repository maps
/// to a disjoint subpath of each, so workers never collide.
pub struct RunRoot {
    pub repos: PathBuf,
    pub databases: PathBuf,
    pub results: PathBuf,
}

impl RunRoot {
    /// Create the namespace directories under ROOT, if missing.
    pub fn create(root: &Path) -> Result<Self, String> {
        let layout = Self {
            repos: root.join("repos"),
            databases: root.join("databases"),
            results: root.join("results"),
        };
        for dir in [&layout.repos, &layout.databases, &layout.results] {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Unable to create {:?}: {}", dir, e))?;
        }
        return Ok(layout);
    }
}

// =============================================================================
// Batch configuration
// =============================================================================

/// Which artifact the analysis stage writes.
pub enum OutputKind {
    /// Raw result set from `codeql query run`.
    Raw,
    /// SARIF report from `codeql database analyze`.
    Sarif { format: String },
}

/// Everything a driver needs to process one list of repositories.
pub struct Batch {
    pub language: String,
    pub query: PathBuf,
    pub root: RunRoot,
    pub output: OutputKind,
}

impl Batch {
    /// Pre-flight a batch: create the run root and resolve the query path.
    /// Both failures abort before any repository is touched.
    pub fn new(
        root: &Path,
        language: String,
        query: &Path,
        output: OutputKind,
    ) -> Result<Self, String> {
        let root = RunRoot::create(root)?;
        let query = fs::canonicalize(query)
            .map_err(|_| format!("Query or pack not found: {:?}", query))?;
        return Ok(Self { language, query, root, output });
    }
}

/// Load the repository list: one `org/name` per line, blank lines and `#`
/// comments ignored.
pub fn load_repo_list(path: &Path) -> Result<Vec<Repo>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Unable to read repo file {:?}: {}", path, e))?;
    let repos = text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Repo::new)
        .collect();
    return Ok(repos);
}

// =============================================================================
// Pipeline
// =============================================================================

/// Run REPO through clone, database creation, and analysis. The first two
/// stages reuse anything already on disk; the artifact is always rewritten.
fn process(batch: &Batch, repo: &Repo, threads: usize) -> Result<PathBuf, String> {
    let repo_dir = repo.clone_into(&batch.root.repos)?;
    let db_dir = db::create_database(repo, &batch.language, &repo_dir, &batch.root.databases)?;

    match &batch.output {
        OutputKind::Raw => {
            analyze::run_query(repo, &db_dir, &batch.query, &batch.root.results)
        },
        OutputKind::Sarif { format } => {
            analyze::analyze_database(repo, &db_dir, &batch.query,
                                      &batch.root.results, format, threads)
        },
    }
}

/// Process every repository in order, one at a time. Failures are isolated
/// per repository and reported once the batch is done.
pub fn run_batch(batch: &Batch, repos: &[Repo]) {
    let mut failures = vec![];

    for repo in repos {
        println!("\n=== Processing {} ===", repo.name);
        match process(batch, repo, 0) {
            Ok(_) => println!("[✓] {}", repo.name),
            Err(e) => {
                println!("[✗] {}", repo.name);
                failures.push((repo.name.clone(), e));
            },
        }
    }

    report_failures(&failures);
}

/// Print the consolidated failure listing, if there is anything to report.
fn report_failures(failures: &[(String, String)]) {
    if failures.is_empty() {
        return;
    }

    println!("\n=== Failures ===");
    for (name, err) in failures {
        println!("\n[{}]\n{}", name, err);
    }
}

// =============================================================================
// External tools
// =============================================================================

/// Run an external tool to completion, capturing its output. A non-zero exit
/// becomes an error carrying the captured stderr.
pub(crate) fn run_tool(mut cmd: Command) -> Result<(), String> {
    let rendered = render_command(&cmd);
    info!("Running: {}", rendered);

    let out = cmd.output()
        .map_err(|e| format!("Failed to execute {}: {}", rendered, e))?;

    if out.status.success() {
        return Ok(());
    }

    let err = String::from_utf8_lossy(&out.stderr).to_string();
    error!("Command failed ({}): {}", out.status, rendered);
    return Err(err);
}

fn render_command(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    return parts.join(" ");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_root_creates_all_namespaces() {
        let tmp = tempdir().unwrap();
        let root = RunRoot::create(&tmp.path().join("run")).unwrap();
        assert!(root.repos.is_dir());
        assert!(root.databases.is_dir());
        assert!(root.results.is_dir());
    }

    #[test]
    fn repo_list_skips_comments_and_blanks() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("repos.txt");
        fs::write(&path, "octo/hello\n# comment\n\norg/two\n").unwrap();

        let repos = load_repo_list(&path).unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["octo/hello", "org/two"]);
    }

    #[test]
    fn missing_repo_list_is_an_error() {
        assert!(load_repo_list(Path::new("no-such-file.txt")).is_err());
    }

    #[test]
    fn missing_query_aborts_preflight() {
        let tmp = tempdir().unwrap();
        let result = Batch::new(
            &tmp.path().join("run"),
            "cpp".to_string(),
            &tmp.path().join("no-such-query.ql"),
            OutputKind::Raw,
        );
        assert!(result.is_err());
    }

    #[test]
    fn failed_tool_reports_its_stderr() {
        let mut cmd = Command::new("git");
        cmd.arg("no-such-subcommand");
        assert!(run_tool(cmd).is_err());
    }
}
