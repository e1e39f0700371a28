//! Versioned working tree used by steps that commit.
//!
//! Steps talk to [`WorkTree`] and [`WorkTreeLoader`] only; [`GitCli`] is the
//! production loader and shells out to `git` in the tree's directory.

mod worktree;

pub use worktree::*;
