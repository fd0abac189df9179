use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

use super::run_tool;

const GITHUB_BASE: &str = "https://github.com";

/// One repository to analyze, identified by its `org/name` pair.
#[derive(Clone, Debug)]
pub struct Repo {
    pub name: String,
}

impl Repo {
    pub fn new(name: &str) -> Self {
        return Self { name: name.to_string() };
    }

    /// Directory name for this repo, safe to nest under a cache root.
    /// `a/b-c` and `a-b/c` collapse to the same name; accepted limitation.
    pub fn safe_dir(&self) -> String {
        return self.name.replace('/', "-");
    }

    /// Upstream clone URL.
    pub fn clone_url(&self) -> String {
        return format!("{}/{}.git", GITHUB_BASE, self.name);
    }

    /// Clone this repo into REPOS_DIR and return the checkout path. An
    /// existing checkout is reused as-is, however stale it may be.
    pub fn clone_into(&self, repos_dir: &Path) -> Result<PathBuf, String> {
        let dir = repos_dir.join(self.safe_dir());
        if dir.exists() {
            info!("Repo already exists, skipping clone: '{}'", self.name);
            return Ok(dir);
        }

        info!("Starting clone of '{}'", self.name);
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(self.clone_url()).arg(&dir);
        run_tool(cmd)?;

        info!("Finished cloning '{}' to {:?}", self.name, dir);
        return Ok(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn safe_dir_replaces_the_separator() {
        assert_eq!(Repo::new("octo/hello").safe_dir(), "octo-hello");
    }

    #[test]
    fn clone_url_points_at_the_host() {
        assert_eq!(
            Repo::new("octo/hello").clone_url(),
            "https://github.com/octo/hello.git"
        );
    }

    #[test]
    fn existing_checkout_skips_the_clone() {
        let tmp = tempdir().unwrap();
        let repo = Repo::new("no-such-org/no-such-repo");
        let dir = tmp.path().join(repo.safe_dir());
        fs::create_dir_all(&dir).unwrap();

        // A fetch would fail: the upstream does not exist
        let result = repo.clone_into(tmp.path());
        assert_eq!(result.unwrap(), dir);
    }
}
