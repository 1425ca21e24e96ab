use url::Url;

/// Rewrites a `src`/`href` attribute value into an absolute URL
///
/// Relative references (including protocol-relative `//host/path` and
/// fragment-only `#anchor`) are resolved against `base`. Values that already
/// carry a scheme, `data:` URIs among them, are returned unchanged, so
/// rewriting is idempotent. Values that cannot be resolved are also returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_atlas::url::absolutize;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// assert_eq!(absolutize("img/logo.png", &base), "https://example.com/docs/img/logo.png");
/// assert_eq!(absolutize("https://cdn.example.com/a.js", &base), "https://cdn.example.com/a.js");
/// assert_eq!(absolutize("data:image/png;base64,AAAA", &base), "data:image/png;base64,AAAA");
/// ```
pub fn absolutize(value: &str, base: &Url) -> String {
    let trimmed = value.trim();

    if trimmed.is_empty() || is_data_uri(trimmed) || has_scheme(trimmed) {
        return value.to_string();
    }

    match base.join(trimmed) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            tracing::debug!("Leaving unresolvable reference {:?}: {}", value, e);
            value.to_string()
        }
    }
}

/// Returns true if the value is an absolute URL or a `data:` URI
pub fn is_absolute_or_data(value: &str) -> bool {
    let trimmed = value.trim();
    is_data_uri(trimmed) || has_scheme(trimmed)
}

fn is_data_uri(value: &str) -> bool {
    value
        .get(..5)
        .map(|prefix| prefix.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

fn has_scheme(value: &str) -> bool {
    Url::parse(value).is_ok()
}
