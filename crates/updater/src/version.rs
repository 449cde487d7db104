use semver::Version;

/// Returns `true` when `candidate` is strictly newer than `current`.
///
/// Components are compared numerically. A leading marker such as `v` and
/// missing minor or patch components are tolerated. Anything else that fails
/// to parse is treated as "not newer".
pub fn is_newer(current: &str, candidate: &str) -> bool {
    match (parse_lenient(current), parse_lenient(candidate)) {
        (Some(current), Some(candidate)) => candidate > current,
        _ => {
            tracing::debug!(current, candidate, "unparseable version, reporting not newer");
            false
        }
    }
}

/// Parse a version such as `1.3`, `v1.3.0` or `1.3.0-rc.1`.
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = strip_marker(raw.trim());
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let (core, rest) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let dots = core.matches('.').count();
    let padded = match dots {
        0 => format!("{core}.0.0{rest}"),
        1 => format!("{core}.0{rest}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Drop a single leading non-digit marker character, as in `v1.3.0`.
pub(crate) fn strip_marker(tag: &str) -> &str {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => chars.as_str(),
        _ => tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_minor_release_is_detected() {
        assert!(is_newer("1.2.0", "1.3.0"));
        assert!(!is_newer("1.3.0", "1.2.0"));
    }

    #[test]
    fn equal_versions_are_not_newer() {
        assert!(!is_newer("1.3.0", "1.3.0"));
        assert!(!is_newer("1.3", "1.3.0"));
    }

    #[test]
    fn components_compare_numerically() {
        assert!(is_newer("1.9.0", "1.10.0"));
        assert!(!is_newer("1.10.0", "1.9.0"));
        assert!(is_newer("0.9.9", "1.0.0"));
    }

    #[test]
    fn short_and_prefixed_versions_parse() {
        assert_eq!(parse_lenient("v1.3"), Some(Version::new(1, 3, 0)));
        assert_eq!(parse_lenient("2"), Some(Version::new(2, 0, 0)));
        assert_eq!(
            parse_lenient("1.4-rc.1").map(|v| v.pre.to_string()),
            Some("rc.1".to_string())
        );
    }

    #[test]
    fn any_marker_character_is_stripped() {
        assert_eq!(parse_lenient("V1.3.0"), Some(Version::new(1, 3, 0)));
        assert!(is_newer("1.2.0", "V1.3.0"));
        assert_eq!(strip_marker("1.3.0"), "1.3.0");
        assert_eq!(strip_marker(""), "");
    }

    #[test]
    fn malformed_versions_are_never_newer() {
        assert!(!is_newer("1.2.0", "not-a-version"));
        assert!(!is_newer("garbage", "1.3.0"));
        assert!(!is_newer("1.2.0", ""));
        assert!(!is_newer("1.2.0", "1.2.3.4"));
    }
}
