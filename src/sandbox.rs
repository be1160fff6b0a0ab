//! Per-user filesystem sandbox
//!
//! Every client-supplied path is resolved against the user's root and must
//! stay inside it. This module is the security boundary of the server:
//! 1. Rejecting absolute paths, NUL bytes and parent directory components
//! 2. Resolving symlinks on the existing part of the path
//! 3. Ensuring the result is under the user root

use crate::error::{LptfError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug)]
pub struct Sandbox {
    server_root: PathBuf,
}

impl Sandbox {
    /// Create the server root if needed and pin it to its canonical form.
    pub fn new(server_root: &Path) -> Result<Self> {
        if !server_root.is_dir() {
            fs::create_dir_all(server_root)?;
        }
        Ok(Self {
            server_root: server_root.canonicalize()?,
        })
    }

    pub fn server_root(&self) -> &Path {
        &self.server_root
    }

    /// `<server_root>/<username>`, created on first use.
    pub fn root_for(&self, username: &str) -> Result<PathBuf> {
        validate_username(username)?;
        let root = self.server_root.join(username);
        if !root.is_dir() {
            fs::create_dir_all(&root)?;
        }
        Ok(root.canonicalize()?)
    }

    /// Resolve a client path under `root`.
    ///
    /// An empty path means `root` itself unless `required` is set.
    pub fn resolve(&self, root: &Path, rel: &str, required: bool) -> Result<PathBuf> {
        if rel.is_empty() {
            if required {
                return Err(LptfError::SandboxViolation("a path is required".into()));
            }
            return Ok(root.to_path_buf());
        }
        if rel.starts_with('/') || rel.starts_with('\\') {
            return Err(LptfError::SandboxViolation(format!(
                "absolute path {rel:?} not allowed"
            )));
        }
        if rel.contains('\0') {
            return Err(LptfError::SandboxViolation("path contains NUL byte".into()));
        }
        let candidate = root.join(rel);
        if !is_contained(&candidate, root) {
            return Err(LptfError::SandboxViolation(format!("{rel:?}")));
        }
        Ok(weakly_canonical(&candidate))
    }
}

/// Usernames become directory names directly under the server root.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(LptfError::Auth("empty username".into()));
    }
    if username.starts_with('.') {
        return Err(LptfError::Auth(format!(
            "username {username:?} may not start with '.'"
        )));
    }
    if username.contains(['/', '\\', '\0', ':']) {
        return Err(LptfError::Auth(format!(
            "username {username:?} contains a forbidden character"
        )));
    }
    Ok(())
}

/// New names for create/rename targets: one path component, never a traversal.
pub fn validate_target_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LptfError::SandboxViolation("empty target name".into()));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(LptfError::SandboxViolation(format!(
            "target name {name:?} starts with a separator"
        )));
    }
    if name == ".." || name == "." {
        return Err(LptfError::SandboxViolation(format!(
            "target name {name:?} not allowed"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(LptfError::SandboxViolation(format!(
            "target name {name:?} must be a single component"
        )));
    }
    Ok(())
}

/// True iff `candidate` lies within `root` (or is `root`).
///
/// Any `..` component disqualifies the candidate outright, even one that
/// would lexically land back inside the root.
pub fn is_contained(candidate: &Path, root: &Path) -> bool {
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return false;
    }
    let canon_root = weakly_canonical(root);
    let canon = weakly_canonical(candidate);
    canon.strip_prefix(&canon_root).is_ok()
}

pub fn is_root(path: &Path, root: &Path) -> bool {
    weakly_canonical(path) == weakly_canonical(root)
}

/// Canonicalize the longest existing ancestor and append the rest lexically.
fn weakly_canonical(p: &Path) -> PathBuf {
    let mut existing = p.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    loop {
        if let Ok(canon) = existing.canonicalize() {
            let mut out = canon;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }
    // nothing exists: fall back to lexical normalization
    let mut out = PathBuf::new();
    for c in p.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
