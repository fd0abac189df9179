use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

use super::git::Repo;
use super::run_tool;

/// Build the CodeQL database for REPO, unless one is already on disk. The
/// presence check is existence-only: an existing database is trusted even if
/// the working copy or language no longer match it.
pub fn create_database(
    repo: &Repo,
    language: &str,
    repo_dir: &Path,
    db_root: &Path,
) -> Result<PathBuf, String> {
    let dir = db_root.join(repo.safe_dir());
    if dir.exists() {
        info!("Database already exists, skipping DB creation: '{}'", repo.name);
        return Ok(dir);
    }

    info!("Creating {} database for '{}'", language, repo.name);
    let mut cmd = Command::new("codeql");
    cmd.arg("database").arg("create").arg(&dir)
        .arg(format!("--language={}", language))
        .arg(format!("--source-root={}", repo_dir.display()));
    run_tool(cmd)?;

    return Ok(dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn existing_database_is_reused() {
        let tmp = tempdir().unwrap();
        let repo = Repo::new("octo/hello");
        let db_root = tmp.path().join("databases");
        let dir = db_root.join(repo.safe_dir());
        fs::create_dir_all(&dir).unwrap();

        // No codeql invocation happens for a pre-built database
        let result = create_database(&repo, "cpp", Path::new("unused"), &db_root);
        assert_eq!(result.unwrap(), dir);
    }
}
