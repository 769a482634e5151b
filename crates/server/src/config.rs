//! Settings for the `dlv` process.

use std::{fs::File, io::Read, path::Path};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 2345;

/// Flags passed through to `go build`, either as one string or one entry per flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildFlags {
    One(String),
    Many(Vec<String>),
}

impl BuildFlags {
    /// The value of `--build-flags`, `None` when there is nothing to pass.
    pub fn to_arg(&self) -> Option<String> {
        let joined = match self {
            BuildFlags::One(flags) => flags.trim().to_string(),
            BuildFlags::Many(flags) => flags
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        };
        (!joined.is_empty()).then_some(joined)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(alias = "serverHost")]
    pub host: String,
    #[serde(alias = "serverPort")]
    pub port: u16,
    #[serde(alias = "buildFlags")]
    pub build_flags: Option<BuildFlags>,
    /// Pass `--log` to delve and trace its log lines.
    #[serde(alias = "logServerMessages")]
    pub log_server_messages: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            build_flags: None,
            log_server_messages: false,
        }
    }
}

impl ServerConfig {
    /// Read a JSON configuration; missing keys take their defaults.
    pub fn load(reader: impl Read) -> eyre::Result<Self> {
        serde_json::from_reader(reader).wrap_err("parsing server configuration")
    }

    pub fn load_from(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading server configuration");
        let f = File::open(path)
            .wrap_err_with(|| format!("opening configuration file {}", path.display()))?;
        Self::load(f)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::load("{}".as_bytes()).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.address(), "127.0.0.1:2345");
    }

    #[test]
    fn build_flags_string_or_list() {
        let one = ServerConfig::load(r#"{"build_flags": "-tags integration"}"#.as_bytes()).unwrap();
        assert_eq!(
            one.build_flags.and_then(|f| f.to_arg()).as_deref(),
            Some("-tags integration")
        );

        let many =
            ServerConfig::load(r#"{"buildFlags": ["-race", "", "-tags=x"]}"#.as_bytes()).unwrap();
        assert_eq!(
            many.build_flags.and_then(|f| f.to_arg()).as_deref(),
            Some("-race -tags=x")
        );

        assert_eq!(BuildFlags::One("  ".into()).to_arg(), None);
    }

    #[test]
    fn editor_style_keys() {
        let config = ServerConfig::load(
            r#"{"serverHost": "0.0.0.0", "serverPort": 4000, "logServerMessages": true}"#.as_bytes(),
        )
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 4000);
        assert!(config.log_server_messages);
    }

    #[test]
    fn load_from_file() -> eyre::Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        write!(f, r#"{{"port": 3000}}"#)?;

        let config = ServerConfig::load_from(f.path())?;

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, DEFAULT_HOST);
        Ok(())
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = ServerConfig::load("{port: 1}".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("parsing server configuration"));
        assert!(ServerConfig::load_from("/definitely/not/here.json").is_err());
    }
}
