//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a single path segment (no dots, no separators)
    pub fn path_segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,8}"
    }

    /// Generate a root-relative component directory such as `hub/encoders/foo`
    pub fn component_path() -> impl Strategy<Value = String> {
        proptest::collection::vec(path_segment(), 1..4).prop_map(|segments| segments.join("/"))
    }

    /// Generate a valid semver version string
    pub fn semver_version() -> impl Strategy<Value = String> {
        (0u32..100, 0u32..100, 0u32..100)
            .prop_map(|(major, minor, patch)| format!("{major}.{minor}.{patch}"))
    }

    /// Generate a policy token, recognized or not
    pub fn policy_token() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("force".to_string()),
            Just("never".to_string()),
            Just("manually".to_string()),
            Just("on-release".to_string()),
            Just("nightly".to_string()),
            Just("on-master".to_string()),
            "[a-z-]{0,12}",
        ]
    }

    /// Generate a Unix timestamp in a plausible range
    pub fn timestamp() -> impl Strategy<Value = i64> {
        0i64..2_000_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_component_path_shape(path in component_path()) {
            prop_assert!(!path.is_empty());
            prop_assert!(!path.contains('.'));
            prop_assert!(!path.starts_with('/'));
            prop_assert!(!path.ends_with('/'));
        }

        #[test]
        fn test_semver_version_parses(version in semver_version()) {
            prop_assert!(semver::Version::parse(&version).is_ok());
        }
    }
}
