//! AMP page detection.
//!
//! A page requested with `amp=1` is likely followed by a navigation to its
//! canonical (non-AMP) equivalent, which is worth prefetching.

use outrider_core::constants::{AMP_QUERY_KEY, AMP_QUERY_VALUE};
use outrider_core::Url;

/// Canonical path of an AMP URL, or `None` if the URL is not an AMP page.
///
/// `/foo?amp=1` becomes `/foo`; other query pairs are kept in order.
pub fn amp_canonical(url: &Url) -> Option<String> {
    let query = url.query()?;
    let marker = format!("{AMP_QUERY_KEY}={AMP_QUERY_VALUE}");
    let mut is_amp = false;
    let mut kept = Vec::new();

    for pair in query.split('&') {
        if pair == marker {
            is_amp = true;
        } else if !pair.is_empty() {
            kept.push(pair);
        }
    }

    if !is_amp {
        return None;
    }

    let path = url.path();
    if kept.is_empty() {
        Some(path.to_string())
    } else {
        Some(format!("{}?{}", path, kept.join("&")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn canonical(s: &str) -> Option<String> {
        amp_canonical(&Url::parse(s).unwrap())
    }

    #[test]
    fn test_amp_only_query() {
        assert_eq!(canonical("https://shop.test/foo?amp=1"), Some("/foo".to_string()));
    }

    #[test]
    fn test_amp_with_other_params() {
        assert_eq!(
            canonical("https://shop.test/s?q=shoes&amp=1&page=2"),
            Some("/s?q=shoes&page=2".to_string())
        );
    }

    #[test]
    fn test_not_amp() {
        assert_eq!(canonical("https://shop.test/foo"), None);
        assert_eq!(canonical("https://shop.test/foo?amp=0"), None);
        assert_eq!(canonical("https://shop.test/foo?camp=1"), None);
        assert_eq!(canonical("https://shop.test/foo?ampx=1"), None);
    }

    proptest! {
        #[test]
        fn prop_canonical_is_never_amp(path in "/[a-z0-9/]{0,16}", q in "[a-z]{1,4}=[a-z0-9]{1,4}") {
            let url = Url::parse(&format!("https://shop.test{path}?{q}&amp=1")).unwrap();
            let canonical = amp_canonical(&url).unwrap();
            let reparsed = Url::parse(&format!("https://shop.test{canonical}")).unwrap();
            prop_assert_eq!(amp_canonical(&reparsed), None);
        }
    }
}
