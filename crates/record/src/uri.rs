use std::path::{Path, PathBuf};
use url::Url;

/// Normalize a filesystem path to the `file://` URI form stored in records.
///
/// Absolute paths become `file:///...`, strings that already carry a scheme are
/// kept as-is, and relative paths are returned unchanged.
#[must_use]
pub fn normalize_uri(path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        if let Ok(url) = Url::from_file_path(candidate) {
            return url.to_string();
        }
    }

    path.to_string()
}

/// Inverse of [`normalize_uri`]: the filesystem path a stored URI points at.
#[must_use]
pub fn uri_to_path(uri: &str) -> PathBuf {
    Url::parse(uri)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(uri))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absolute_path_becomes_file_uri() {
        assert_eq!(normalize_uri("/testing.php"), "file:///testing.php");
    }

    #[test]
    fn existing_uri_is_kept() {
        assert_eq!(normalize_uri("file:///a/b.php"), "file:///a/b.php");
        assert_eq!(normalize_uri("untitled://buffer-1"), "untitled://buffer-1");
    }

    #[test]
    fn relative_path_is_kept() {
        assert_eq!(normalize_uri("src/Foo.php"), "src/Foo.php");
    }

    #[test]
    fn uri_maps_back_to_path() {
        let uri = normalize_uri("/project/src/Foo Bar.php");
        assert_eq!(uri_to_path(&uri), PathBuf::from("/project/src/Foo Bar.php"));
        assert_eq!(uri_to_path("src/Foo.php"), PathBuf::from("src/Foo.php"));
    }
}
