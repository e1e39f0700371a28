//! Sandboxed path resolution.
//!
//! [`secure_join`] joins a user-supplied relative path onto a sandbox root and
//! refuses any result that would leave the root, either lexically (`..`) or
//! through a symlink found on the way. It only reads link metadata; nothing is
//! created or modified.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Same limit the kernel applies before reporting `ELOOP`.
const MAX_SYMLINK_HOPS: usize = 40;

/// Join `relative` onto `root`, following symlinks inside the sandbox.
///
/// Returns the resolved absolute path, which may not exist yet. Absolute
/// inputs, `..` past the root, and symlinks pointing outside the root are all
/// rejected with `sandbox.path_escape`.
pub fn secure_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let escape = || Error::sandbox_path_escape(root.display().to_string(), relative);

    let rel = Path::new(relative);
    if rel.has_root() || rel.components().any(|c| matches!(c, Component::Prefix(_))) {
        return Err(escape());
    }

    let mut pending: VecDeque<OsString> = VecDeque::new();
    push_front_components(&mut pending, rel).map_err(|_| escape())?;

    let mut resolved: Vec<OsString> = Vec::new();
    let mut hops = 0usize;
    let mut canonical_root: Option<PathBuf> = None;

    while let Some(part) = pending.pop_front() {
        if part == ".." {
            if resolved.pop().is_none() {
                return Err(escape());
            }
            continue;
        }

        resolved.push(part);
        let candidate = join_all(root, &resolved);

        let is_link = std::fs::symlink_metadata(&candidate)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link {
            continue;
        }

        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return Err(escape());
        }

        let target = std::fs::read_link(&candidate).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read link {}", candidate.display())))
        })?;
        resolved.pop();

        if target.is_absolute() {
            let inside = strip_root(root, &target, &mut canonical_root).ok_or_else(escape)?;
            resolved.clear();
            push_front_components(&mut pending, &inside).map_err(|_| escape())?;
        } else {
            push_front_components(&mut pending, &target).map_err(|_| escape())?;
        }
    }

    Ok(join_all(root, &resolved))
}

fn join_all(root: &Path, parts: &[OsString]) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in parts {
        path.push(part);
    }
    path
}

/// Queue `path`'s components ahead of whatever is already pending.
fn push_front_components(
    pending: &mut VecDeque<OsString>,
    path: &Path,
) -> std::result::Result<(), ()> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => parts.push(OsString::from("..")),
            Component::Normal(name) => parts.push(name.to_os_string()),
            Component::RootDir | Component::Prefix(_) => return Err(()),
        }
    }
    for part in parts.into_iter().rev() {
        pending.push_front(part);
    }
    Ok(())
}

/// Express an absolute link target relative to the sandbox root, if it lies inside it.
fn strip_root(root: &Path, target: &Path, canonical_root: &mut Option<PathBuf>) -> Option<PathBuf> {
    if let Ok(rest) = target.strip_prefix(root) {
        return Some(rest.to_path_buf());
    }
    if canonical_root.is_none() {
        *canonical_root = root.canonicalize().ok();
    }
    canonical_root
        .as_deref()
        .and_then(|canon| target.strip_prefix(canon).ok())
        .map(Path::to_path_buf)
}
