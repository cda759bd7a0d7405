//! Locating external tools (the linker, an archiver).
//!
//! The path cache is deliberately process-scoped: it is the only global
//! state in the workspace, and it lives here rather than in the core so
//! concurrent solves stay isolated.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

fn cache() -> &'static Mutex<HashMap<String, Option<PathBuf>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<PathBuf>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Find an executable on `PATH`, caching the answer for the process.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if let Ok(guard) = cache().lock() {
        if let Some(found) = guard.get(name) {
            return found.clone();
        }
    }

    let found = search_path(name);
    if let Ok(mut guard) = cache().lock() {
        guard.insert(name.to_string(), found.clone());
    }
    found
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::find_executable;

    #[test]
    fn lookups_are_stable_within_a_process() {
        let first = find_executable("definitely-not-a-real-tool");
        let second = find_executable("definitely-not-a-real-tool");
        assert_eq!(first, second);
        assert!(first.is_none());
    }
}
