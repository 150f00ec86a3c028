use crate::converter::errors::{ConverterResult, FileOperationError};
use log::{debug, trace};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.\-]").unwrap());
static SPACES_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").unwrap());
static MULTIPLE_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());

/// One mutex per output directory. Probing for a free name and creating the
/// file happen under it, so parallel writers never pick the same name.
static DIRECTORY_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

const FALLBACK_NAME: &str = "unnamed";

/// Turn arbitrary heading text into a filesystem-safe slug.
///
/// Never fails: input that has nothing usable left maps to `"unnamed"`.
/// Applying it twice gives the same result as applying it once.
pub fn normalize(raw_title: &str) -> String {
    let lowered = raw_title.to_lowercase();
    let cleaned = INVALID_CHARS.replace_all(&lowered, "");
    let hyphenated = SPACES_HYPHENS.replace_all(&cleaned, "-");
    let dotted = MULTIPLE_DOTS.replace_all(&hyphenated, ".");
    // an empty extension segment ("title.") goes away with the trim
    let slug = dotted.trim_matches(|c| c == '-' || c == '.');

    if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug.to_string()
    }
}

/// First free file name for `base.ext`: the plain name, then `base-1.ext`,
/// `base-2.ext`, ... where `taken` reports names already in use.
pub fn next_free_name(base: &str, ext: &str, taken: impl Fn(&str) -> bool) -> String {
    let candidate = |suffix: Option<u32>| match (suffix, ext.is_empty()) {
        (None, true) => base.to_string(),
        (None, false) => format!("{}.{}", base, ext),
        (Some(n), true) => format!("{}-{}", base, n),
        (Some(n), false) => format!("{}-{}.{}", base, n, ext),
    };

    let first = candidate(None);
    if !taken(&first) {
        return first;
    }
    (1..)
        .map(|n| candidate(Some(n)))
        .find(|name| !taken(name))
        .unwrap_or(first)
}

/// Pick a path in `dir` for `base.ext` that does not exist yet.
///
/// The directory is created first; the probe runs under the directory lock.
/// Callers that also need to create the file should use [`reserve_unique`],
/// which keeps probe and create inside one critical section.
pub fn uniquify(base: &str, ext: &str, dir: &Path) -> ConverterResult<PathBuf> {
    ensure_directory(dir)?;
    let lock = directory_lock(dir);
    let _guard = lock.lock();
    let name = next_free_name(base, ext, |name| dir.join(name).exists());
    Ok(dir.join(name))
}

/// Pick a free path for `base.ext` in `dir` and create it empty, atomically
/// with respect to other callers targeting the same directory.
pub fn reserve_unique(base: &str, ext: &str, dir: &Path) -> ConverterResult<PathBuf> {
    ensure_directory(dir)?;
    let lock = directory_lock(dir);
    let _guard = lock.lock();

    loop {
        let name = next_free_name(base, ext, |name| dir.join(name).exists());
        let path = dir.join(&name);
        // create_new also guards against writers outside this process
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Reserved output file {:?}", path);
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                trace!("{:?} appeared while probing, trying next name", path);
            }
            Err(source) => {
                return Err(FileOperationError::FileWriteFailed { path, source }.into());
            }
        }
    }
}

fn ensure_directory(dir: &Path) -> ConverterResult<()> {
    if dir.as_os_str().is_empty() {
        return Err(FileOperationError::InvalidPath("Empty directory path".to_string()).into());
    }
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|source| FileOperationError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn directory_lock(dir: &Path) -> Arc<Mutex<()>> {
    let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    DIRECTORY_LOCKS.lock().entry(key).or_default().clone()
}
