// Deck Gate - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Single source of truth for logical document names and template search.
// Callers only ever see logical names; local layout never leaks out.
//
// SECURITY NOTE: document_name() is the traversal guard for every
// caller-supplied name (tool arguments and the HTTP serving path).

use crate::config::GatewayConfig;
use reqwest::Url;
use std::path::{Path, PathBuf};

/// Normalize a caller-supplied path into a logical document name.
///
/// Keeps only the final component (either separator style) and forces
/// the document extension. Returns None for names with no usable basename.
pub fn document_name(raw: &str, extension: &str) -> Option<String> {
    let base = basename(raw)?;
    if base.ends_with(extension) {
        Some(base.to_string())
    } else {
        Some(format!("{}{}", base, extension))
    }
}

/// Final path component of a caller-supplied string
pub fn basename(raw: &str) -> Option<&str> {
    let base = raw.trim().rsplit(['/', '\\']).next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base)
}

/// Ordered template search directories.
///
/// Resolution order:
///   1. Operator-configured path (PPT_TEMPLATE_PATH)
///   2. Conventional mount points
///   3. ./templates under the working directory
///   4. The working directory itself
pub fn template_search_dirs(config: &GatewayConfig, cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(env_path) = &config.templates.env_path {
        dirs.push(env_path.clone());
    }
    dirs.extend(config.templates.mounts.iter().cloned());
    dirs.push(cwd.join("templates"));
    dirs.push(cwd.to_path_buf());
    dirs
}

/// First directory containing `name` as a regular file
pub fn find_in_dirs(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Public download URL for a logical document name (percent-encoded)
pub fn download_url(base_url: &str, name: &str) -> String {
    match Url::parse(base_url) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push("presentations").push(name);
            }
            url.to_string()
        }
        Err(e) => {
            log::warn!("Invalid base URL {:?}: {}", base_url, e);
            format!("{}/presentations/{}", base_url.trim_end_matches('/'), name)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_strips_directories() {
        assert_eq!(document_name("deck.pptx", ".pptx").as_deref(), Some("deck.pptx"));
        assert_eq!(document_name("/tmp/x/deck.pptx", ".pptx").as_deref(), Some("deck.pptx"));
        assert_eq!(document_name("..\\..\\deck", ".pptx").as_deref(), Some("deck.pptx"));
        assert_eq!(document_name("../../etc/passwd", ".pptx").as_deref(), Some("passwd.pptx"));
    }

    #[test]
    fn document_name_rejects_empty_basename() {
        assert_eq!(document_name("", ".pptx"), None);
        assert_eq!(document_name("dir/", ".pptx"), None);
        assert_eq!(document_name("..", ".pptx"), None);
    }

    #[test]
    fn template_dirs_in_order() {
        let mut config = GatewayConfig::default();
        config.templates.env_path = Some(PathBuf::from("/opt/tpl"));
        let dirs = template_search_dirs(&config, Path::new("/work"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/opt/tpl"),
                PathBuf::from("/app/templates"),
                PathBuf::from("/mnt/templates"),
                PathBuf::from("/work/templates"),
                PathBuf::from("/work"),
            ]
        );
    }

    #[test]
    fn find_in_dirs_returns_first_hit() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(b.path().join("t.pptx"), b"{}").unwrap();
        let dirs = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        assert_eq!(find_in_dirs("t.pptx", &dirs), Some(b.path().join("t.pptx")));
        assert_eq!(find_in_dirs("none.pptx", &dirs), None);
    }

    #[test]
    fn download_url_encodes_name() {
        assert_eq!(
            download_url("https://decks.example.com", "Q3 review.pptx"),
            "https://decks.example.com/presentations/Q3%20review.pptx"
        );
        assert_eq!(
            download_url("http://0.0.0.0:8000/", "a.pptx"),
            "http://0.0.0.0:8000/presentations/a.pptx"
        );
    }
}
