//! Application and database identity derivation.
//!
//! The application identity keys the per-application database server; the
//! database name selects the per-branch database inside it. Both come from
//! the git checkout the embedding application lives in.
//!
//! # Which checkout
//!
//! The caller supplies a starting path (normally its working directory).
//! Candidates are tried in a fixed order and the first one that answers wins:
//!
//! 1. the checkout enclosing the starting path;
//! 2. the checkout enclosing the running executable (covers binaries run
//!    from `target/` inside a checkout while the working directory is
//!    elsewhere).
//!
//! No call-stack inspection is involved.

mod git;

use std::path::PathBuf;
use std::sync::OnceLock;

use git2::Repository;
use uuid::Uuid;

pub use git::application_name_from_remote;

/// Database name used when no branch can be determined.
pub const FALLBACK_DATABASE_NAME: &str = "master";

/// Derives application identity and database name.
#[derive(Debug)]
pub struct NameResolver {
    application_name: Option<String>,
    start_path: Option<PathBuf>,
    executable_path: Option<PathBuf>,
    generated: OnceLock<String>,
}

impl NameResolver {
    /// Resolve relative to `start_path`, falling back to the executable's
    /// location.
    pub fn new(start_path: impl Into<PathBuf>) -> Self {
        Self {
            application_name: None,
            start_path: Some(start_path.into()),
            executable_path: std::env::current_exe().ok(),
            generated: OnceLock::new(),
        }
    }

    /// Resolve relative to the process working directory.
    pub fn from_current_dir() -> Self {
        Self {
            start_path: std::env::current_dir().ok(),
            ..Self::new(PathBuf::new())
        }
    }

    /// Use an explicit application name; empty names are ignored.
    pub fn with_application_name(mut self, name: Option<String>) -> Self {
        self.application_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Replace (or disable, with `None`) the executable-location fallback.
    pub fn with_executable_path(mut self, path: Option<PathBuf>) -> Self {
        self.executable_path = path;
        self
    }

    /// Checkouts to consult, in priority order.
    fn checkouts(&self) -> impl Iterator<Item = Repository> + '_ {
        self.start_path
            .iter()
            .chain(self.executable_path.iter())
            .filter(|p| !p.as_os_str().is_empty())
            .filter_map(|p| git::open_checkout(p))
    }

    /// Identity of the application this process belongs to.
    ///
    /// Explicit name, then the remote URL of the enclosing checkout, then a
    /// generated name. Never fails; the generated name is stable for the
    /// lifetime of this resolver.
    pub fn resolve_application_identity(&self) -> String {
        if let Some(name) = &self.application_name {
            tracing::debug!(application = %name, "Using configured application name");
            return name.clone();
        }

        let derived = self.checkouts().find_map(|repo| {
            let remote = git::remote_url(&repo)?;
            git::application_name_from_remote(&remote)
        });
        if let Some(name) = derived {
            tracing::debug!(application = %name, "Derived application name from git remote");
            return name;
        }

        let generated = self
            .generated
            .get_or_init(|| format!("APP-NAME-{}", Uuid::new_v4()));
        tracing::debug!(application = %generated, "Using generated application name");
        generated.clone()
    }

    /// Name of the current branch, or `"master"` without one.
    pub fn resolve_database_name(&self) -> String {
        self.checkouts()
            .find_map(|repo| git::head_branch(&repo))
            .unwrap_or_else(|| FALLBACK_DATABASE_NAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    fn checkout(branch: &str, remote: Option<&str>) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.set_head(&format!("refs/heads/{branch}")).unwrap();
        if let Some(url) = remote {
            repo.remote("origin", url).unwrap();
        }
        dir
    }

    fn resolver(path: &Path) -> NameResolver {
        NameResolver::new(path).with_executable_path(None)
    }

    #[test]
    fn test_explicit_name_wins() {
        let repo = checkout("main", Some("https://github.com/acme/widgets.git"));
        let resolver = resolver(repo.path()).with_application_name(Some("billing".to_string()));

        assert_eq!(resolver.resolve_application_identity(), "billing");
    }

    #[test]
    fn test_blank_explicit_name_is_ignored() {
        let repo = checkout("main", Some("https://github.com/acme/widgets.git"));
        let resolver = resolver(repo.path()).with_application_name(Some("  ".to_string()));

        assert_eq!(resolver.resolve_application_identity(), "acme-widgets");
    }

    #[test]
    fn test_identity_from_remote_in_subdirectory() {
        let repo = checkout("main", Some("git@github.com:acme/widgets.git"));
        let nested = repo.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            resolver(&nested).resolve_application_identity(),
            "acme-widgets"
        );
    }

    #[test]
    fn test_tracked_remote_is_preferred() {
        let repo_dir = checkout("feature", Some("https://example.com/acme/origin-app.git"));
        let repo = Repository::open(repo_dir.path()).unwrap();
        repo.remote("upstream", "https://example.com/acme/upstream-app.git")
            .unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("branch.feature.remote", "upstream").unwrap();

        assert_eq!(
            resolver(repo_dir.path()).resolve_application_identity(),
            "acme-upstream-app"
        );
    }

    #[test]
    fn test_generated_identity_without_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        let first = resolver.resolve_application_identity();
        assert!(first.starts_with("APP-NAME-"));
        assert_eq!(resolver.resolve_application_identity(), first);

        let other = NameResolver::new(dir.path())
            .with_executable_path(None)
            .resolve_application_identity();
        assert_ne!(other, first);
    }

    #[test]
    fn test_checkout_without_remote_generates_identity() {
        let repo = checkout("main", None);
        assert!(
            resolver(repo.path())
                .resolve_application_identity()
                .starts_with("APP-NAME-")
        );
    }

    #[test]
    fn test_database_name_is_current_branch() {
        let repo = checkout("feature/login", None);
        assert_eq!(resolver(repo.path()).resolve_database_name(), "feature/login");
    }

    #[test]
    fn test_database_name_fallback() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolver(dir.path()).resolve_database_name(), "master");
    }

    #[test]
    fn test_executable_location_is_second_candidate() {
        let outside = tempfile::tempdir().unwrap();
        let repo = checkout("release", Some("https://example.com/acme/tool.git"));
        let exe = repo.path().join("target").join("debug").join("tool");
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"").unwrap();

        let resolver = NameResolver::new(outside.path()).with_executable_path(Some(exe));
        assert_eq!(resolver.resolve_application_identity(), "acme-tool");
        assert_eq!(resolver.resolve_database_name(), "release");
    }
}
