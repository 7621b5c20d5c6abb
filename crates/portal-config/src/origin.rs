//! Origin derivation for popup URLs and inbound message origins.

use url::Url;

/// Serialized origin of `raw`, or `None` for unparsable input and
/// opaque origins (`data:`, `file:`, `about:blank`, ...).
pub fn origin_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

/// Whether `candidate` has the same origin as `expected`.
///
/// `expected` must already be a serialized origin; opaque candidates never match.
pub fn same_origin(candidate: &str, expected: &str) -> bool {
    origin_of(candidate).is_some_and(|origin| origin == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_path_query_and_fragment() {
        assert_eq!(
            origin_of("https://connect.trezor.io/8/popup.html?x=1#loading").as_deref(),
            Some("https://connect.trezor.io")
        );
    }

    #[test]
    fn keeps_non_default_port() {
        assert_eq!(
            origin_of("http://localhost:8088/popup.html").as_deref(),
            Some("http://localhost:8088")
        );
        assert_eq!(
            origin_of("https://example.com:443/").as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn opaque_and_garbage_have_no_origin() {
        assert_eq!(origin_of("about:blank"), None);
        assert_eq!(origin_of("data:text/html,<h1>x</h1>"), None);
        assert_eq!(origin_of("not a url"), None);
        assert_eq!(origin_of(""), None);
    }

    #[test]
    fn same_origin_compares_serialized_form() {
        assert!(same_origin(
            "https://connect.trezor.io",
            "https://connect.trezor.io"
        ));
        assert!(same_origin(
            "https://connect.trezor.io/",
            "https://connect.trezor.io"
        ));
        assert!(!same_origin("https://evil.example", "https://connect.trezor.io"));
        assert!(!same_origin("http://connect.trezor.io", "https://connect.trezor.io"));
        assert!(!same_origin("null", "https://connect.trezor.io"));
    }
}
