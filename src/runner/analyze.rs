use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

use super::git::Repo;
use super::run_tool;

/// Evaluate QUERY against a database, writing the raw result set. The
/// artifact path depends only on the repo name, so reruns overwrite it.
pub fn run_query(
    repo: &Repo,
    db_dir: &Path,
    query: &Path,
    results_dir: &Path,
) -> Result<PathBuf, String> {
    let result_file = result_file(results_dir, repo, "bqrs");

    info!("Running query against '{}'", repo.name);
    let mut cmd = Command::new("codeql");
    cmd.arg("query").arg("run").arg(query)
        .arg("--database").arg(db_dir)
        .arg("--output").arg(&result_file);
    run_tool(cmd)?;

    return Ok(result_file);
}

/// Analyze a database with QUERY, writing a SARIF report. THREADS is passed
/// straight through to the external tool.
pub fn analyze_database(
    repo: &Repo,
    db_dir: &Path,
    query: &Path,
    results_dir: &Path,
    sarif_format: &str,
    threads: usize,
) -> Result<PathBuf, String> {
    let sarif_file = result_file(results_dir, repo, "sarif");

    info!("Analyzing '{}'", repo.name);
    let mut cmd = Command::new("codeql");
    cmd.arg("database").arg("analyze").arg(db_dir).arg(query)
        .arg("--format").arg(sarif_format)
        .arg("--output").arg(&sarif_file)
        .arg("--threads").arg(threads.to_string());
    run_tool(cmd)?;

    return Ok(sarif_file);
}

fn result_file(results_dir: &Path, repo: &Repo, ext: &str) -> PathBuf {
    return results_dir.join(format!("{}.{}", repo.safe_dir(), ext));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_derives_from_the_repo_name() {
        let repo = Repo::new("octo/hello");
        assert_eq!(
            result_file(Path::new("results"), &repo, "sarif"),
            Path::new("results").join("octo-hello.sarif")
        );
        assert_eq!(
            result_file(Path::new("results"), &repo, "bqrs"),
            Path::new("results").join("octo-hello.bqrs")
        );
    }
}
