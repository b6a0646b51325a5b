//! Offline fallback content.

use crate::cache::FetchResponse;

/// Inline star placeholder served for images that cannot be fetched.
pub const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg width="100" height="100" viewBox="0 0 100 100" xmlns="http://www.w3.org/2000/svg">"##,
    r##"<rect width="100" height="100" fill="#fbbf24" fill-opacity="0.2"/>"##,
    r##"<text x="50" y="50" text-anchor="middle" dy=".3em" font-family="Arial" font-size="14" fill="#fbbf24">⭐</text>"##,
    r##"</svg>"##
);

/// Builds the placeholder image response.
pub fn placeholder_image() -> FetchResponse {
    FetchResponse::ok(PLACEHOLDER_SVG).with_content_type("image/svg+xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_svg_image() {
        let response = placeholder_image();
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert!(!response.body.is_empty());
        assert!(response.body.starts_with(b"<svg"));
    }
}
