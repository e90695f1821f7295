//! Version information reported by the health check.

/// orderpool library version from Cargo.toml
pub const ORDERPOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    /// Library version.
    pub orderpool: &'static str,
    /// Version of the hosting server binary, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            orderpool: ORDERPOOL_VERSION,
            server: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, version: impl Into<String>) -> Self {
        self.server = Some(version.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_info_has_library_version() {
        let info = VersionInfo::new();
        assert_eq!(info.orderpool, ORDERPOOL_VERSION);
        assert!(info.server.is_none());
    }

    #[test]
    fn version_info_serializes_minimal() {
        let info = VersionInfo {
            orderpool: "0.1.0",
            server: None,
        };
        insta::assert_json_snapshot!(info, @r###"
        {
          "orderpool": "0.1.0"
        }
        "###);
    }

    #[test]
    fn version_info_serializes_full() {
        let info = VersionInfo {
            orderpool: "0.1.0",
            server: None,
        }
        .with_server("0.2.0");
        insta::assert_json_snapshot!(info, @r###"
        {
          "orderpool": "0.1.0",
          "server": "0.2.0"
        }
        "###);
    }
}
