//! INI configuration for [`ProviderBuilder`].
//!
//! Settings live in a `[provider]` section whose keys mirror the builder
//! setters:
//!
//! ```ini
//! [provider]
//! base_url = wss://ide.example/
//! connection_timeout_ms = 4000
//! call_timeout_ms = 30000
//! max_enqueued_messages = 256
//! tls_insecure_skip_verify = false
//! ```
//!
//! A file without a `[provider]` section yields the default builder.

use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use ini::Ini;
use thiserror::Error;

use crate::{provider::ProviderBuilder, socket::TlsOptions};

/// Section holding provider settings.
pub const PROVIDER_SECTION: &str = "provider";

/// Errors raised while loading INI configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid INI: {0}")]
    Parse(#[from] ini::ParseError),
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

pub(crate) fn load_file(path: &Path) -> Result<ProviderBuilder, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text)
}

pub(crate) fn load_str(text: &str) -> Result<ProviderBuilder, ConfigError> {
    let ini = Ini::load_from_str(text)?;
    let mut builder = ProviderBuilder::new();
    let Some(section) = ini.section(Some(PROVIDER_SECTION)) else {
        return Ok(builder);
    };
    for (key, value) in section.iter() {
        let value = value.trim();
        builder = match key {
            "base_url" => builder.with_base_url(value),
            "capacity" => builder.with_capacity(parse(key, value)?),
            "connection_timeout_ms" => builder.with_connection_timeout_ms(parse(key, value)?),
            "poll_interval_ms" => builder.with_poll_interval_ms(parse(key, value)?),
            "call_timeout_ms" => builder.with_call_timeout_ms(parse(key, value)?),
            "max_enqueued_messages" => builder.with_max_enqueued_messages(parse(key, value)?),
            "tls_insecure_skip_verify" => builder.with_tls(TlsOptions {
                insecure_skip_verify: parse_bool(key, value)?,
            }),
            _ => return Err(invalid(key, value, "unknown setting")),
        };
    }
    Ok(builder)
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| invalid(key, value, &err.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::provider::ProviderBuildError;

    #[rstest]
    fn reads_provider_section() {
        let provider = load_str(
            "[provider]\nbase_url = ws://localhost:3000\ncall_timeout_ms = 750\n\
             max_enqueued_messages = 4\n\n[other]\nignored = yes\n",
        )
        .expect("parse")
        .build()
        .expect("build");
        assert_eq!(provider.base_url(), Some("ws://localhost:3000"));
        assert_eq!(provider.call_timeout(), Duration::from_millis(750));
        assert_eq!(provider.socket_options().max_enqueued_messages, Some(4));
    }

    #[rstest]
    fn missing_section_yields_defaults() {
        let provider = load_str("[elsewhere]\nkey = value\n")
            .expect("parse")
            .build()
            .expect("build");
        assert_eq!(provider.base_url(), None);
    }

    #[rstest]
    #[case("[provider]\ncapacity = lots\n", "capacity")]
    #[case("[provider]\ntls_insecure_skip_verify = maybe\n", "tls_insecure_skip_verify")]
    #[case("[provider]\nretries = 3\n", "retries")]
    fn rejects_bad_values(#[case] text: &str, #[case] expected_key: &str) {
        let err = load_str(text).expect_err("invalid setting");
        let ConfigError::InvalidValue { key, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(key, expected_key);
    }

    #[rstest]
    fn builder_reads_from_disk() {
        let mut file = NamedTempFile::new().expect("create temp ini file");
        writeln!(file, "[provider]\nconnection_timeout_ms = 1200").expect("write ini contents");
        let provider = ProviderBuilder::from_ini_file(file.path())
            .expect("load")
            .build()
            .expect("build");
        assert_eq!(
            provider.socket_options().connection_timeout,
            Duration::from_millis(1200)
        );
    }

    #[rstest]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.ini");
        let err = ProviderBuilder::from_ini_file(&path).expect_err("missing file");
        let ProviderBuildError::Config(ConfigError::Io { path: reported, .. }) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(reported, path);
    }

    #[rstest]
    fn validation_still_applies_to_loaded_values() {
        let err = ProviderBuilder::from_ini_str("[provider]\npoll_interval_ms = 0\n")
            .expect("parse")
            .build()
            .expect_err("zero interval");
        assert!(matches!(err, ProviderBuildError::InvalidConfig(_)));
    }
}
