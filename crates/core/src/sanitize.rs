//! Turns untrusted attachment filenames into safe, collision-free local paths.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

/// Name used when nothing usable is left after sanitizing.
pub const DEFAULT_FILENAME: &str = "unnamed_file";

fn unsafe_chars_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("filename regex must compile")
    })
}

/// Percent-decodes `raw`, falling back to the raw value when the decoded bytes
/// are not valid UTF-8.
#[must_use]
pub fn decode_filename(raw: &str) -> Cow<'_, str> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(filename = raw, error = %e, "could not decode filename, using raw value");
            Cow::Borrowed(raw)
        },
    }
}

/// Produces a filename that is safe on both Windows and Unix filesystems.
///
/// Decodes percent-escapes, replaces reserved and control characters with
/// `_`, trims surrounding spaces and dots, and substitutes
/// [`DEFAULT_FILENAME`] if the result is empty.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let decoded = decode_filename(raw);
    let replaced = unsafe_chars_regex().replace_all(&decoded, "_");
    let trimmed = replaced.trim_matches(|c: char| c == ' ' || c == '.');

    let safe = if trimmed.is_empty() { DEFAULT_FILENAME } else { trimmed };
    if safe != decoded {
        tracing::info!(from = %decoded, to = safe, "sanitized filename");
    }
    safe.to_owned()
}

/// Returns `directory/safe_name`, or the first free `name_N.ext` variant
/// (`N` = 1, 2, ...) if that path already exists.
///
/// The check is not atomic; callers download one file at a time.
#[must_use]
pub fn resolve_collision(directory: &Path, safe_name: &str) -> PathBuf {
    let candidate = directory.join(safe_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = split_extension(safe_name);
    let mut counter: u64 = 1;
    loop {
        let candidate = directory.join(format!("{stem}_{counter}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Splits at the last dot, keeping the dot with the extension. A leading dot
/// does not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if name[..pos].chars().any(|c| c != '.') => name.split_at(pos),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sanitize_decodes_then_replaces_separator() {
        assert_eq!(sanitize("a%2Fb.txt"), "a_b.txt");
    }

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize(r#"a<b>c:d"e\f|g?h*i.txt"#), "a_b_c_d_e_f_g_h_i.txt");
    }

    #[test]
    fn test_sanitize_replaces_control_characters() {
        assert_eq!(sanitize("line\nbreak\ttab.log"), "line_break_tab.log");
    }

    #[test]
    fn test_sanitize_strips_dots_and_spaces() {
        assert_eq!(sanitize("  ..report.pdf.. "), "report.pdf");
    }

    #[test]
    fn test_sanitize_empty_after_strip_uses_default() {
        assert_eq!(sanitize("   ...   "), DEFAULT_FILENAME);
        assert_eq!(sanitize(""), DEFAULT_FILENAME);
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize("%E8%A6%8B%E7%A9%8D%E6%9B%B8.xlsx"), "見積書.xlsx");
    }

    #[test]
    fn test_sanitize_invalid_utf8_falls_back_to_raw() {
        assert_eq!(sanitize("bad%FFname.bin"), "bad%FFname.bin");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".env"), (".env", ""));
    }

    #[test]
    fn test_resolve_collision_free_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_collision(dir.path(), "report.pdf"), dir.path().join("report.pdf"));
    }

    #[test]
    fn test_resolve_collision_increments_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), b"v0").unwrap();

        let first = resolve_collision(dir.path(), "report.pdf");
        assert_eq!(first, dir.path().join("report_1.pdf"));
        fs::write(&first, b"v1").unwrap();

        let second = resolve_collision(dir.path(), "report.pdf");
        assert_eq!(second, dir.path().join("report_2.pdf"));
    }

    #[test]
    fn test_resolve_collision_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes"), b"x").unwrap();
        assert_eq!(resolve_collision(dir.path(), "notes"), dir.path().join("notes_1"));
    }
}
