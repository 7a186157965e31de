//! Per-mutant working copies of the project
//!
//! Each mutant runs in its own temporary copy of the project root, with the
//! mutated source written over the original file. Nothing in the real
//! project directory is ever modified.
//!
//! Build output (`target/`) is not copied, so every sandbox starts from a
//! cold build unless the test command uses a compiler cache.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::warn;

/// Entries never copied into a sandbox
const SKIP_NAMES: &[&str] = &[".git", ".hg", ".svn", "target", "node_modules", ".venv", "__pycache__"];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.contains(&name)
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if should_skip(&name.to_string_lossy()) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // symlinks and special files stay behind
    }
    Ok(())
}

/// A materialised mutant: a private project copy that is removed on drop
#[derive(Debug)]
pub struct Sandbox {
    dir: TempDir,
    source_file: PathBuf,
}

impl Sandbox {
    /// Copy `project_root` into a fresh directory and write `contents` at the
    /// path of `source_file` inside it
    ///
    /// `source_file` must live under `project_root`.
    pub fn create(project_root: &Path, source_file: &Path, label: &str, contents: &str) -> io::Result<Self> {
        let relative = source_file
            .strip_prefix(project_root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("bugbane-{}-", label))
            .tempdir()?;
        copy_dir_filtered(project_root, dir.path())?;

        let target = dir.path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, contents)?;

        Ok(Self {
            dir,
            source_file: target,
        })
    }

    /// Sandbox for the mutant with `id`
    pub fn for_mutant(project_root: &Path, source_file: &Path, id: usize, contents: &str) -> io::Result<Self> {
        Self::create(project_root, source_file, &format!("mutant-{}", id), contents)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The mutated source file inside the copy
    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Remove the copy now, logging instead of failing
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), "failed to remove sandbox: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src").join("util")).unwrap();
        fs::write(root.join("Cargo.toml"), "[package]").unwrap();
        fs::write(root.join("src").join("lib.rs"), "mod util;").unwrap();
        fs::write(root.join("src").join("util").join("math.rs"), "fn add() {}").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git").join("HEAD"), "ref").unwrap();
        fs::create_dir(root.join("target")).unwrap();
        fs::write(root.join("target").join("big.bin"), "bytes").unwrap();
        dir
    }

    #[test]
    fn test_copies_project_and_writes_mutant() {
        let dir = project();
        let source = dir.path().join("src").join("util").join("math.rs");
        let sandbox = Sandbox::for_mutant(dir.path(), &source, 7, "fn sub() {}").unwrap();

        assert!(sandbox.root().join("Cargo.toml").exists());
        assert!(sandbox.root().join("src").join("lib.rs").exists());
        assert_eq!(fs::read_to_string(sandbox.source_file()).unwrap(), "fn sub() {}");
        assert_eq!(
            sandbox.source_file(),
            sandbox.root().join("src").join("util").join("math.rs")
        );
        // the real project is untouched
        assert_eq!(fs::read_to_string(&source).unwrap(), "fn add() {}");
    }

    #[test]
    fn test_skips_vcs_and_build_dirs() {
        let dir = project();
        let source = dir.path().join("src").join("lib.rs");
        let sandbox = Sandbox::for_mutant(dir.path(), &source, 1, "").unwrap();
        assert!(!sandbox.root().join(".git").exists());
        assert!(!sandbox.root().join("target").exists());
    }

    #[test]
    fn test_sandboxes_are_distinct_and_removed() {
        let dir = project();
        let source = dir.path().join("src").join("lib.rs");
        let a = Sandbox::for_mutant(dir.path(), &source, 1, "a").unwrap();
        let b = Sandbox::for_mutant(dir.path(), &source, 2, "b").unwrap();
        assert_ne!(a.root(), b.root());
        assert!(a
            .root()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("bugbane-mutant-1-"));

        let path = a.root().to_path_buf();
        a.cleanup();
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(b.source_file()).unwrap(), "b");
    }

    #[test]
    fn test_source_outside_project_is_rejected() {
        let dir = project();
        let other = TempDir::new().unwrap();
        let err = Sandbox::for_mutant(dir.path(), &other.path().join("x.rs"), 1, "").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_should_skip() {
        assert!(should_skip(".git"));
        assert!(should_skip("target"));
        assert!(!should_skip("src"));
        assert!(!should_skip("Cargo.toml"));
    }
}
