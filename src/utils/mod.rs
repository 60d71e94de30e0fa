use anyhow::{bail, Context, Result};
use std::path::Path;

/// Create the parent directory of an output file if needed
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }
    Ok(())
}

/// Fail early with a readable message when an input file is absent
pub fn require_file<P: AsRef<Path>>(path: P, what: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.is_file() {
        bail!("{} not found: {:?}", what, path);
    }
    Ok(())
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Format number with commas
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// First `limit` identifiers joined for display, with the remainder counted
pub fn preview<S: AsRef<str>>(ids: &[S], limit: usize) -> String {
    let shown: Vec<&str> = ids.iter().take(limit).map(|s| s.as_ref()).collect();
    let mut out = shown.join(", ");
    if ids.len() > limit {
        out.push_str(&format!(" (+{} more)", ids.len() - limit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.25), "250ms");
        assert_eq!(format_duration(30.0), "30.0s");
        assert_eq!(format_duration(90.0), "1.5m");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_preview() {
        let ids = ["A", "B", "C", "D"];
        assert_eq!(preview(&ids, 2), "A, B (+2 more)");
        assert_eq!(preview(&ids, 10), "A, B, C, D");
        let empty: [&str; 0] = [];
        assert_eq!(preview(&empty, 3), "");
    }

    #[test]
    fn test_ensure_parent_dir_and_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/matrix.csv");
        ensure_parent_dir(&out).unwrap();
        assert!(out.parent().unwrap().is_dir());
        assert!(require_file(&out, "Matrix").is_err());
        std::fs::write(&out, "Gene\n").unwrap();
        assert!(require_file(&out, "Matrix").is_ok());
        // bare file names have no parent to create
        ensure_parent_dir("matrix.csv").unwrap();
    }
}
