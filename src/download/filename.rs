//! Filename extraction, sanitization, and output path resolution.

use std::path::{Component, Path, PathBuf};

use url::Url;

/// Name used when a URL has no usable last path segment.
pub(crate) const INDEX_FILENAME: &str = "index.html";

/// Extracts the filename from a Content-Disposition header value.
///
/// Prefers the RFC 5987 `filename*=charset''encoded` parameter over the
/// plain `filename=` parameter (quoted or bare).
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                if let Some((_, encoded)) = value.trim().split_once("''")
                    && let Ok(decoded) = urlencoding::decode(encoded.trim())
                    && !decoded.is_empty()
                {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => {
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|inner| inner.strip_suffix('"'))
                    .unwrap_or(value);
                if !value.is_empty() {
                    plain = Some(value.to_string());
                }
            }
            _ => {}
        }
    }
    plain
}

/// Percent-decoded last path segment of `url`, or `index.html`.
pub(crate) fn name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map_or_else(|_| segment.to_string(), std::borrow::Cow::into_owned)
        })
        .unwrap_or_else(|| INDEX_FILENAME.to_string())
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) and neutralizes `.`/`..`.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Returns `dir/filename`, or `dir/stem_N.ext` for the first free `N` if taken.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = sanitize_filename(filename);
    let filename = if filename.trim_matches('_').is_empty() {
        "download.bin".to_string()
    } else {
        filename
    };
    let base_path = dir.join(&filename);
    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => filename.split_at(pos),
        _ => (filename.as_str(), ""),
    };
    (1..)
        .map(|i| dir.join(format!("{stem}_{i}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base_path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_disposition_quoted() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="report final.pdf""#),
            Some("report final.pdf".to_string())
        );
    }

    #[test]
    fn test_content_disposition_unquoted() {
        assert_eq!(
            parse_content_disposition("attachment; filename=archive.zip; size=10"),
            Some("archive.zip".to_string())
        );
    }

    #[test]
    fn test_content_disposition_prefers_rfc5987() {
        assert_eq!(
            parse_content_disposition(
                "attachment; filename=\"fallback.txt\"; filename*=UTF-8''na%C3%AFve%20file.txt"
            ),
            Some("naïve file.txt".to_string())
        );
    }

    #[test]
    fn test_content_disposition_without_filename() {
        assert_eq!(parse_content_disposition("inline"), None);
        assert_eq!(parse_content_disposition("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_name_from_url() {
        let url = Url::parse("https://a.example/dir/my%20file.tar.gz?x=1").unwrap();
        assert_eq!(name_from_url(&url), "my file.tar.gz");
        let root = Url::parse("https://a.example/").unwrap();
        assert_eq!(name_from_url(&root), "index.html");
        let dir = Url::parse("https://a.example/dir/").unwrap();
        assert_eq!(name_from_url(&dir), "index.html");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename(""), "_");
        assert_eq!(sanitize_filename("file (1).pdf"), "file (1).pdf");
    }

    #[test]
    fn test_resolve_unique_path_adds_suffix() {
        let dir = TempDir::new().unwrap();
        let first = resolve_unique_path(dir.path(), "a.bin");
        assert_eq!(first, dir.path().join("a.bin"));
        std::fs::write(&first, b"x").unwrap();
        let second = resolve_unique_path(dir.path(), "a.bin");
        assert_eq!(second, dir.path().join("a_1.bin"));
        std::fs::write(&second, b"x").unwrap();
        assert_eq!(resolve_unique_path(dir.path(), "a.bin"), dir.path().join("a_2.bin"));
    }

    #[test]
    fn test_resolve_unique_path_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let path = resolve_unique_path(dir.path(), "../../etc/passwd");
        assert_eq!(path.parent().unwrap(), dir.path());
    }
}
