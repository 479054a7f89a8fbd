// Typed endpoint surface of the control API
//
// Each submodule adds inherent methods to `ApiClient`. Every method
// resolves to `None` on failure after reporting it to the error sink.

mod integration;
mod settings;
mod tailscale;
mod wgs2s;

use url::Url;

/// Percent-encode a single path segment (tunnel ids are user-supplied).
fn segment(raw: &str) -> String {
    let Ok(mut scratch) = Url::parse("http://localhost/") else {
        return String::new();
    };
    if let Ok(mut path) = scratch.path_segments_mut() {
        path.clear().push(raw);
    }
    scratch.path().trim_start_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use super::segment;

    #[test]
    fn segment_escapes_separators() {
        assert_eq!(segment("wg0"), "wg0");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
        assert_eq!(segment("a+b"), "a+b");
        assert_eq!(segment("50%"), "50%25");
    }
}
