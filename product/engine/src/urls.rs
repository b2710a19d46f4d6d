use url::Url;

/// Resolves `raw_url` against `base_url`, keeping only http(s) results.
pub fn normalize_url_with_base(raw_url: &str, base_url: &Url) -> Option<String> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return None;
    }
    let lower = raw_url.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
        || lower.starts_with('#')
    {
        return None;
    }

    let mut joined = base_url.join(raw_url).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    joined.set_fragment(None);
    Some(joined.to_string())
}

/// Last segment of the URL path, as it appears in the URL. Empty when the
/// path ends with `/`.
pub fn path_basename(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path().rsplit('/').next().unwrap_or("");
    Some(name.to_string())
}

pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|v| v.to_ascii_lowercase())
}
