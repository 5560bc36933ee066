//! Cluster construction variant tags.

use crate::{HarnessError, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Selects which engine generation the harness starts.
///
/// The set is closed: probe and mirror are diagnostic sub-variants that
/// start exactly like [`ClusterVariant::Legacy`] but are kept as distinct
/// tags so instrumented runs can be told apart in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterVariant {
    /// Shared-process cluster.
    Legacy,

    /// Legacy cluster under diagnostic probing.
    LegacyProbe,

    /// Legacy cluster with traffic mirroring.
    LegacyMirror,

    /// Builder-configured cluster with ephemeral port read-back.
    New,
}

impl ClusterVariant {
    /// Environment variable consulted by [`ClusterVariant::from_env`].
    pub const ENV_VAR: &'static str = "GRIDSTONE_CODEBASE";

    /// Resolves the variant from the environment. An unset variable
    /// selects [`ClusterVariant::Legacy`]; an unrecognized value fails
    /// fast rather than falling back.
    pub fn from_env() -> Result<Self> {
        match env::var(Self::ENV_VAR) {
            Ok(tag) => tag.parse(),
            Err(env::VarError::NotPresent) => Ok(Self::Legacy),
            Err(env::VarError::NotUnicode(_)) => Err(HarnessError::UnsupportedVariant {
                tag: "<non-unicode>".to_string(),
            }),
        }
    }

    /// Whether this tag starts the legacy engine generation.
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Legacy | Self::LegacyProbe | Self::LegacyMirror)
    }
}

impl FromStr for ClusterVariant {
    type Err = HarnessError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "legacy" => Ok(Self::Legacy),
            "legacy-probe" => Ok(Self::LegacyProbe),
            "legacy-mirror" => Ok(Self::LegacyMirror),
            "new" => Ok(Self::New),
            _ => Err(HarnessError::UnsupportedVariant {
                tag: tag.to_string(),
            }),
        }
    }
}

impl fmt::Display for ClusterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Legacy => "legacy",
            Self::LegacyProbe => "legacy-probe",
            Self::LegacyMirror => "legacy-mirror",
            Self::New => "new",
        };
        f.write_str(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("legacy", ClusterVariant::Legacy)]
    #[test_case("legacy-probe", ClusterVariant::LegacyProbe)]
    #[test_case("legacy-mirror", ClusterVariant::LegacyMirror)]
    #[test_case("new", ClusterVariant::New)]
    fn test_parse_known_tags(tag: &str, expected: ClusterVariant) {
        assert_eq!(tag.parse::<ClusterVariant>().unwrap(), expected);
        assert_eq!(expected.to_string(), tag);
    }

    #[test]
    fn test_unknown_tag_fails_fast() {
        let result = "quantum".parse::<ClusterVariant>();
        assert!(matches!(
            result,
            Err(HarnessError::UnsupportedVariant { ref tag }) if tag == "quantum"
        ));
    }

    #[test]
    fn test_case_sensitive() {
        assert!("Legacy".parse::<ClusterVariant>().is_err());
    }

    #[test]
    fn test_diagnostic_variants_are_legacy() {
        assert!(ClusterVariant::Legacy.is_legacy());
        assert!(ClusterVariant::LegacyProbe.is_legacy());
        assert!(ClusterVariant::LegacyMirror.is_legacy());
        assert!(!ClusterVariant::New.is_legacy());
    }
}
