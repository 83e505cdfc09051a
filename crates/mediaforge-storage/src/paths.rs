//! Shared key and URL conventions for stored media.
//!
//! Originals: `{owner_dir}/{filename}`. Variants: `{owner_dir}/{size}/{filename}`
//! (same filename, size-named subdirectory). This makes variant lookup a pure
//! path join.

/// Extensions that never get derived size variants (animated formats keep
/// their frames; a resized still would lose the animation).
const ANIMATED_EXTENSIONS: &[&str] = &["gif"];

/// Extension of a storage key or filename, lowercased, without the dot.
pub fn extension(key: &str) -> Option<String> {
    let file = file_name(key);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Final path segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Directory portion of a key ("" for bare filenames).
pub fn parent_dir(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Storage key for a named size variant of an original.
pub fn variant_key(original_key: &str, size_name: &str) -> String {
    let dir = parent_dir(original_key);
    let file = file_name(original_key);
    if dir.is_empty() {
        format!("{}/{}", size_name, file)
    } else {
        format!("{}/{}/{}", dir, size_name, file)
    }
}

/// Replace a key's extension, keeping directory and stem.
pub fn with_extension(key: &str, new_ext: &str) -> String {
    match key.rsplit_once('.') {
        Some((stem, old_ext)) if !old_ext.contains('/') => format!("{}.{}", stem, new_ext),
        _ => format!("{}.{}", key, new_ext),
    }
}

/// Whether an original never gets sized variants (animated formats).
pub fn is_animated(key: &str) -> bool {
    extension(key)
        .map(|ext| ANIMATED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type implied by a key's extension.
pub fn mime_type(key: &str) -> Option<&'static str> {
    match extension(key)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webm" => Some("video/webm"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "mkv" => Some("video/x-matroska"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Whether a key's extension implies an image MIME type.
pub fn is_image(key: &str) -> bool {
    mime_type(key).map(|m| m.starts_with("image/")).unwrap_or(false)
}

/// Whether a key's extension implies a video MIME type.
pub fn is_video(key: &str) -> bool {
    mime_type(key).map(|m| m.starts_with("video/")).unwrap_or(false)
}

/// Public URL for a stored object: CDN base + key + optional size
/// subdirectory. Animated originals silently fall back to the original path
/// when a size is requested, since no variant exists for them.
pub fn resolve_url(cdn_base: &str, key: &str, size_name: Option<&str>) -> String {
    let base = cdn_base.trim_end_matches('/');
    match size_name {
        Some(size) if !is_animated(key) => format!("{}/{}", base, variant_key(key, size)),
        _ => format!("{}/{}", base, key),
    }
}

/// Canonical filename for an uploaded file: lowercased, non-safe characters
/// replaced, extension preserved.
pub fn canonical_file_name(original: &str) -> String {
    let (stem, ext) = match original.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, Some(e)),
        _ => (original, None),
    };
    let mut out: String = stem
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    let out = out.trim_matches('-');
    let stem = if out.is_empty() { "file" } else { out };
    match ext {
        Some(e) => format!("{}.{}", stem, e.to_lowercase()),
        None => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_key_is_size_subdirectory() {
        assert_eq!(
            variant_key("products/42/chair.webp", "thumb"),
            "products/42/thumb/chair.webp"
        );
        assert_eq!(variant_key("chair.webp", "thumb"), "thumb/chair.webp");
    }

    #[test]
    fn resolve_url_joins_cdn_and_size() {
        assert_eq!(
            resolve_url("https://cdn.example.com/", "products/42/chair.webp", None),
            "https://cdn.example.com/products/42/chair.webp"
        );
        assert_eq!(
            resolve_url("https://cdn.example.com", "products/42/chair.webp", Some("icon")),
            "https://cdn.example.com/products/42/icon/chair.webp"
        );
    }

    #[test]
    fn animated_originals_never_resolve_to_variants() {
        assert!(is_animated("banners/loop.gif"));
        assert_eq!(
            resolve_url("https://cdn.example.com", "banners/loop.gif", Some("thumb")),
            "https://cdn.example.com/banners/loop.gif"
        );
    }

    #[test]
    fn mime_type_by_extension() {
        assert_eq!(mime_type("a/b/c.JPG"), Some("image/jpeg"));
        assert_eq!(mime_type("clip.webm"), Some("video/webm"));
        assert_eq!(mime_type("noext"), None);
        assert!(is_image("x.png"));
        assert!(is_video("x.mp4"));
        assert!(!is_image("x.mp4"));
    }

    #[test]
    fn with_extension_replaces_only_file_extension() {
        assert_eq!(with_extension("a/b.png", "webp"), "a/b.webp");
        assert_eq!(with_extension("a.dir/file", "webp"), "a.dir/file.webp");
    }

    #[test]
    fn canonical_file_name_is_url_safe() {
        assert_eq!(
            canonical_file_name("My Fancy Chair (2).JPG"),
            "my-fancy-chair-2.jpg"
        );
        assert_eq!(canonical_file_name("(((.png"), "file.png");
        assert_eq!(canonical_file_name("photo"), "photo");
    }
}
