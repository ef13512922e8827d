//! Logging options shared by the daemon entry points.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported telemetry output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Human-readable single line output.
    #[default]
    Compact,
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(LogFormat::from_str("JSON").ok(), Some(LogFormat::Json));
        assert_eq!(
            LogFormat::from_str("compact").ok(),
            Some(LogFormat::Compact)
        );
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(LogFormat::from_str("yaml").is_err());
    }
}
