//! Dotted version comparison.
//!
//! Versions are compared component by component as unsigned integers. Missing
//! trailing components count as `0`, and so does any component that is not a
//! number, so malformed input degrades instead of failing.

use std::cmp::Ordering;

/// Fallback reported when a release tag is missing.
pub const UNKNOWN_VERSION: &str = "0.0.0";

fn components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse::<u64>().unwrap_or(0))
        .collect()
}

/// Compare two dotted version strings.
///
/// `compare_versions("1.2", "1.2.0")` is [`Ordering::Equal`];
/// `compare_versions("2.4.0", "2.4.1")` is [`Ordering::Less`].
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = components(a);
    let b = components(b);
    let len = a.len().max(b.len());

    for i in 0..len {
        let an = a.get(i).copied().unwrap_or(0);
        let bn = b.get(i).copied().unwrap_or(0);
        match an.cmp(&bn) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns `true` if `latest` is strictly newer than `current`.
pub fn version_is_newer(current: &str, latest: &str) -> bool {
    compare_versions(current, latest) == Ordering::Less
}

/// Normalize a release tag: strip a single leading `v`, default to
/// [`UNKNOWN_VERSION`] when nothing is left.
pub fn normalize_tag(tag: Option<&str>) -> String {
    let stripped = tag.map(|t| t.strip_prefix('v').unwrap_or(t)).unwrap_or("");
    if stripped.is_empty() {
        UNKNOWN_VERSION.to_owned()
    } else {
        stripped.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_components_are_equal() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1", "1.0.0.0"), Ordering::Equal);
    }

    #[test]
    fn known_orderings() {
        assert_eq!(compare_versions("2.4.0", "2.4.1"), Ordering::Less);
        assert_eq!(compare_versions("10.0.0", "9.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.9.99", "0.10.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.1", "1.0"), Ordering::Greater);
    }

    #[test]
    fn numeric_form_matches_contract() {
        assert_eq!(compare_versions("2.4.0", "2.4.1") as i8, -1);
        assert_eq!(compare_versions("1.2.5", "1.2.5") as i8, 0);
        assert_eq!(compare_versions("1.3", "1.2.9") as i8, 1);
    }

    #[test]
    fn non_numeric_components_count_as_zero() {
        assert_eq!(compare_versions("1.x.3", "1.0.3"), Ordering::Equal);
        assert_eq!(compare_versions("beta", "0"), Ordering::Equal);
        assert_eq!(compare_versions("", "0.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2-rc1", "1.0"), Ordering::Equal);
    }

    #[test]
    fn comparison_is_antisymmetric_and_reflexive() {
        let samples = [
            "0", "0.1", "1.0", "1.0.0", "1.2.3", "1.10", "2", "2.4.1", "10.0.0", "9.9.9.9",
        ];
        for a in samples {
            assert_eq!(compare_versions(a, a), Ordering::Equal, "{a} vs itself");
            for b in samples {
                assert_eq!(
                    compare_versions(a, b),
                    compare_versions(b, a).reverse(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn newer_detection() {
        assert!(version_is_newer("2.4.1", "2.5.0"));
        assert!(!version_is_newer("2.4.1", "2.4.1"));
        assert!(!version_is_newer("2.5.0", "2.4.1"));
    }

    #[test]
    fn tag_normalization() {
        assert_eq!(normalize_tag(Some("v2.4.1")), "2.4.1");
        assert_eq!(normalize_tag(Some("2.4.1")), "2.4.1");
        assert_eq!(normalize_tag(Some("vv1.0")), "v1.0");
        assert_eq!(normalize_tag(Some("")), "0.0.0");
        assert_eq!(normalize_tag(Some("v")), "0.0.0");
        assert_eq!(normalize_tag(None), "0.0.0");
    }
}
