//! Static identity of a unit of work.

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Name, version and description shared by every execution of an operation
/// or sequence.
///
/// Two units of work are the same kind when their ids match. The version is
/// metadata only; compatibility between versions is left to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Version")]
    pub version: Version,
    #[serde(rename = "Description")]
    pub description: String,
}

impl Definition {
    pub fn new(id: impl Into<String>, version: Version, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version,
            description: description.into(),
        }
    }

    /// Build a definition from a version string such as `"1.0.0"`.
    pub fn parse(
        id: impl Into<String>,
        version: &str,
        description: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let version = Version::parse(version)
            .with_context(|| format!("invalid version {version:?} for {id}"))?;
        Ok(Self::new(id, version, description))
    }

    pub fn same_kind(&self, other: &Definition) -> bool {
        self.id == other.id
    }
}
