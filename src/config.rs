//! Decoder session configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DetailError, Syntax, Target};

/// Options fixed for the lifetime of one decoder session.
///
/// Missing fields take their [`Default`] values when read from JSON:
/// x86-64, detail on, the oracle's default syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub target: Target,
    /// Decode typed operands and register accesses for every instruction.
    pub detail: bool,
    pub syntax: Syntax,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            target: Target::X86_64,
            detail: true,
            syntax: Syntax::Default,
        }
    }
}

impl DecoderConfig {
    /// Default options for `target`.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, DetailError> {
        serde_json::from_str(text).map_err(DetailError::Config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DetailError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.target, Target::X86_64);
        assert!(config.detail);
        assert_eq!(config.syntax, Syntax::Default);
        assert_eq!(DecoderConfig::new(Target::Thumb).target, Target::Thumb);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = DecoderConfig::from_json(r#"{ "target": "aarch64" }"#).unwrap();
        assert_eq!(config.target, Target::AArch64);
        assert!(config.detail);

        let config =
            DecoderConfig::from_json(r#"{ "target": "x86_32", "detail": false, "syntax": "att" }"#)
                .unwrap();
        assert_eq!(config.target, Target::X86_32);
        assert!(!config.detail);
        assert_eq!(config.syntax, Syntax::Att);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = DecoderConfig::from_json(r#"{ "target": "vax" }"#).unwrap_err();
        assert!(matches!(err, DetailError::Config(_)));
    }

    #[test]
    fn test_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"{{ "target": "mips32", "detail": false }}"#)?;
        let config = DecoderConfig::from_file(file.path())?;
        assert_eq!(config.target, Target::Mips32);
        assert!(!config.detail);
        Ok(())
    }
}
