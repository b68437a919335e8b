//! Shared helpers: tracing setup, gem name keys, bounded input reads.

use crate::config::MAX_INPUT_FILE_BYTES;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Install the stderr tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Lookup key for gem names and tags: trimmed, lowercase, inner runs of
/// whitespace collapsed to one space.
pub fn name_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Read a catalog or config file as text, refusing files over
/// [`MAX_INPUT_FILE_BYTES`].
pub fn read_input_file(path: &Path) -> Result<String, String> {
    read_bounded(path, MAX_INPUT_FILE_BYTES)
}

fn read_bounded(path: &Path, max_bytes: u64) -> Result<String, String> {
    let size = fs::metadata(path)
        .map_err(|e| format!("{}: {}", path.display(), e))?
        .len();
    if size > max_bytes {
        return Err(format!(
            "{}: {} bytes exceeds the {} byte input limit",
            path.display(),
            size,
            max_bytes
        ));
    }
    fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_folds_case_and_spacing() {
        assert_eq!(name_key("  Fireball  "), "fireball");
        assert_eq!(name_key("Controlled   Destruction"), "controlled destruction");
        assert_eq!(name_key("AoE"), name_key("aoe"));
    }

    #[test]
    fn bounded_read_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gems.json");
        fs::write(&path, "x".repeat(64)).unwrap();
        assert_eq!(read_bounded(&path, 64).unwrap().len(), 64);
        let err = read_bounded(&path, 63).unwrap_err();
        assert!(err.contains("input limit"), "{}", err);
        assert!(read_input_file(&dir.path().join("missing.json")).is_err());
    }
}
