//! Read-only access to the git checkout enclosing a path.

use std::path::Path;

use git2::Repository;

const DEFAULT_REMOTE: &str = "origin";

/// Open the checkout containing `start`, searching parent directories.
pub(crate) fn open_checkout(start: &Path) -> Option<Repository> {
    let dir = if start.is_file() { start.parent()? } else { start };
    match Repository::discover(dir) {
        Ok(repo) => {
            tracing::debug!(path = %dir.display(), root = %repo.path().display(), "Found git checkout");
            Some(repo)
        }
        Err(e) => {
            tracing::trace!(path = %dir.display(), "No git checkout: {}", e);
            None
        }
    }
}

/// Short name of the branch HEAD points at; `None` when detached.
///
/// Reads the symbolic HEAD directly so freshly initialised repositories
/// (unborn branch, no commits) still report their branch.
pub(crate) fn head_branch(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    head.symbolic_target()?
        .strip_prefix("refs/heads/")
        .map(str::to_string)
}

/// URL of the remote the current branch tracks (`origin` when untracked).
///
/// A branch tracking the local repository (`remote = .`) has no remote URL.
pub(crate) fn remote_url(repo: &Repository) -> Option<String> {
    let config = repo.config().ok()?;

    let remote = head_branch(repo)
        .and_then(|branch| config.get_string(&format!("branch.{branch}.remote")).ok())
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());

    if remote == "." {
        return None;
    }

    config.get_string(&format!("remote.{remote}.url")).ok()
}

/// Turn a remote URL into an application name.
///
/// Takes the path part of the URL (or of an scp-style `host:path` remote),
/// strips `.git` from each segment and joins the non-empty segments with
/// `-`: `https://github.com/acme/widgets.git` becomes `acme-widgets`.
pub fn application_name_from_remote(remote: &str) -> Option<String> {
    let path = match url::Url::parse(remote) {
        Ok(url) if url.has_host() || url.scheme() == "file" => url.path().to_string(),
        _ => match remote.split_once(':') {
            Some((_, path)) if !remote.contains("://") => path.to_string(),
            _ => remote.to_string(),
        },
    };

    let name = path
        .split('/')
        .map(|segment| segment.strip_suffix(".git").unwrap_or(segment))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if name.is_empty() { None } else { Some(name) }
}
