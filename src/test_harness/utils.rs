//! Shared utilities for the test harness
//!
//! Contains the filesystem primitives the runner depends on:
//! - Path resolution and absolute-path checks
//! - Directory creation, recreation and listing
//! - Reading scripts and appending case output

use super::error::{TestHarnessError, TestHarnessResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// ==================== Path Utilities ====================

/// Resolve a path relative to a base directory
///
/// If the path is absolute, returns it as-is.
/// If the path is relative, joins it with the base directory.
pub fn resolve_path(path: impl AsRef<Path>, base_dir: &Path) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Fail with a configuration error unless `path` is absolute
pub fn ensure_absolute(path: &Path) -> TestHarnessResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(TestHarnessError::config(format!(
            "path is not absolute: {}",
            path.display()
        )))
    }
}

/// Make a possibly relative path absolute against the current directory
pub fn absolutize(path: &Path) -> TestHarnessResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| TestHarnessError::io(e, "."))?;
    Ok(cwd.join(path))
}

/// File name without the given suffix (`test_a.hql` -> `test_a`)
pub fn short_name(path: &Path, suffix: &str) -> String {
    let name = file_name(path);
    name.strip_suffix(suffix).unwrap_or(&name).to_string()
}

/// Lossy file name of a path, empty when there is none
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

// ==================== Directory Utilities ====================

/// Create `path` and its parents unless it already is a directory
pub fn ensure_directories(path: &Path) -> TestHarnessResult<()> {
    if !path.is_dir() {
        fs::create_dir_all(path).map_err(|e| TestHarnessError::io(e, path))?;
    }
    Ok(())
}

/// Delete `path` recursively if present and create it again, empty
///
/// Refuses to touch regular files.
pub fn recreate_dir(path: &Path) -> TestHarnessResult<()> {
    if path.is_file() {
        return Err(TestHarnessError::IoError {
            message: "refusing to recreate a regular file as a directory".to_string(),
            path: path.display().to_string(),
        });
    }

    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(TestHarnessError::io(e, path)),
    }

    ensure_directories(path)
}

/// Immediate sub-directories of `path`, sorted by path
pub fn sub_directories(path: &Path) -> TestHarnessResult<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = read_dir_paths(path)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Regular files directly inside `path` that satisfy `predicate`, sorted
pub fn sub_files<F>(path: &Path, predicate: F) -> TestHarnessResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut files: Vec<PathBuf> = read_dir_paths(path)?
        .into_iter()
        .filter(|p| p.is_file() && predicate(p))
        .collect();
    files.sort();
    Ok(files)
}

fn read_dir_paths(path: &Path) -> TestHarnessResult<Vec<PathBuf>> {
    let entries = fs::read_dir(path).map_err(|e| TestHarnessError::io(e, path))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TestHarnessError::io(e, path))?;
        paths.push(entry.path());
    }
    Ok(paths)
}

// ==================== File Utilities ====================

/// Read all lines of a UTF-8 file
pub fn read_lines(path: &Path) -> TestHarnessResult<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| TestHarnessError::io(e, path))?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Read a UTF-8 file with line endings normalised to `\n`
pub fn read_file(path: &Path) -> TestHarnessResult<String> {
    Ok(read_lines(path)?.join("\n"))
}

/// Append `content` to `dir/name`, separated from earlier runs by blank lines
///
/// `dir` must be absolute; it is created when missing.
pub fn append_to_file(dir: &Path, name: &str, content: &str) -> TestHarnessResult<PathBuf> {
    ensure_absolute(dir)?;
    ensure_directories(dir)?;

    let dest = dir.join(name);
    let old = match fs::read_to_string(&dest) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(TestHarnessError::io(e, &dest)),
    };

    fs::write(&dest, format!("{}\n\n\n{}", old, content))
        .map_err(|e| TestHarnessError::io(e, &dest))?;
    Ok(dest)
}
