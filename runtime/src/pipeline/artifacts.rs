//! Per-run output directory and the small artifact files written into it.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::warn;
use url::Url;

pub const RUN_SUMMARY_FILE: &str = "run_summary.txt";
pub const NO_DATA_FILE: &str = "NO_DATA.txt";
pub const NAV_ERROR_PREFIX: &str = "ERROR_NAV_";
pub const SHOT_ERROR_PREFIX: &str = "ERROR_SHOT_";

/// Maximum length of a sanitized file-name stem, in characters.
const MAX_STEM_CHARS: usize = 180;

fn unsafe_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w.-]+").expect("sanitize regex is valid"))
}

/// Turn arbitrary text (a URL, a path) into a safe file-name stem.
pub fn sanitize(name: &str) -> String {
    let replaced = unsafe_run().replace_all(name, "_");
    replaced
        .trim_matches('_')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect()
}

/// The run's output directory. Artifact writes are best-effort: a failure is
/// logged and never fails the task that produced it.
#[derive(Debug)]
pub struct RunDirectory {
    path: PathBuf,
    screenshot_names: Mutex<HashSet<String>>,
}

impl RunDirectory {
    /// Create `<root>/<run_id>`.
    pub fn create(root: &Path, run_id: &str) -> std::io::Result<Self> {
        let path = root.join(run_id);
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            screenshot_names: Mutex::new(HashSet::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn write_best_effort(&self, name: &str, content: &str) -> Option<PathBuf> {
        let path = self.path.join(name);
        match std::fs::write(&path, content) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("failed to write {}: {e}", path.display());
                None
            }
        }
    }

    /// `run_summary.txt` at the start of a run.
    pub fn write_run_summary(&self, input: &Path, total: usize) -> std::io::Result<()> {
        std::fs::write(
            self.join(RUN_SUMMARY_FILE),
            format!("input: {}\ntotal_tasks: {total}\n", input.display()),
        )
    }

    /// `NO_DATA.txt` when the manifest produced no tasks.
    pub fn write_no_data(&self, input: &Path) -> std::io::Result<()> {
        std::fs::write(
            self.join(NO_DATA_FILE),
            format!("no tasks parsed from {}\n", input.display()),
        )
    }

    /// `ERROR_NAV_<url>.txt` carrying the navigation failure reason.
    pub fn write_navigation_error(&self, url: &str, reason: &str) -> Option<PathBuf> {
        self.write_best_effort(&format!("{NAV_ERROR_PREFIX}{}.txt", sanitize(url)), reason)
    }

    /// `ERROR_SHOT_<url>.txt` carrying the capture failure reason.
    pub fn write_capture_error(&self, url: &str, reason: &str) -> Option<PathBuf> {
        self.write_best_effort(&format!("{SHOT_ERROR_PREFIX}{}.txt", sanitize(url)), reason)
    }

    /// Reserve `<domain>_<path>.png` for `url`. Names already taken in this
    /// run get a `_2`, `_3`, … suffix.
    pub fn screenshot_path(&self, domain: &str, url: &str) -> PathBuf {
        let url_path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let stem = match (sanitize(domain), sanitize(&url_path)) {
            (d, p) if d.is_empty() && p.is_empty() => "page".to_string(),
            (d, p) if p.is_empty() => d,
            (d, p) if d.is_empty() => p,
            (d, p) => format!("{d}_{p}"),
        };

        let mut names = match self.screenshot_names.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut candidate = stem.clone();
        let mut n = 1;
        while !names.insert(candidate.clone()) {
            n += 1;
            candidate = format!("{stem}_{n}");
        }
        self.path.join(format!("{candidate}.png"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize("https://it.investing.com/indices/it-mib-40?x=1"),
            "https_it.investing.com_indices_it-mib-40_x_1"
        );
        assert_eq!(sanitize("///"), "");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(500);
        assert_eq!(sanitize(&long).chars().count(), 180);
    }

    #[test]
    fn test_screenshot_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(dir.path(), "20261019_120000").unwrap();
        let a = run.screenshot_path("it.investing.com", "https://it.investing.com/equities/eni?a=1");
        let b = run.screenshot_path("it.investing.com", "https://it.investing.com/equities/eni?a=2");
        assert_eq!(a.file_name().unwrap(), "it.investing.com_equities_eni.png");
        assert_eq!(b.file_name().unwrap(), "it.investing.com_equities_eni_2.png");
    }

    #[test]
    fn test_error_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(dir.path(), "run").unwrap();
        let path = run
            .write_navigation_error("https://down.example/q", "navigation timed out")
            .unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "ERROR_NAV_https_down.example_q.txt"
        );
        assert_eq!(std::fs::read_to_string(path).unwrap(), "navigation timed out");
    }
}
