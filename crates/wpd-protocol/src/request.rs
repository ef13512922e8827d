//! Request line parsing.

use thiserror::Error;

/// Errors surfaced while parsing a request line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestParseError {
    /// The line does not contain the mandatory colon separator.
    #[error("Parsing error: colon not found")]
    MissingSeparator,
}

/// One parsed command request: a name and its argument list.
///
/// Produced per wire message and discarded after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    name: String,
    args: Vec<String>,
}

impl Request {
    /// Parses a request line of the form `name:arg1,arg2,...`.
    ///
    /// The trailing newline, if still present, is ignored. The argument
    /// tail is split on commas; each argument is trimmed of horizontal
    /// whitespace and empty arguments are dropped, so `spin_up: demo ,,`
    /// parses to a single argument `demo`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestParseError::MissingSeparator`] when the line has no
    /// colon. The command name is not validated here; unknown names are the
    /// dispatcher's concern.
    pub fn parse(line: &str) -> Result<Self, RequestParseError> {
        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        let Some((name, tail)) = trimmed.split_once(':') else {
            return Err(RequestParseError::MissingSeparator);
        };
        let args = tail
            .split(',')
            .map(|arg| arg.trim_matches([' ', '\t']))
            .filter(|arg| !arg.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self {
            name: name.to_owned(),
            args,
        })
    }

    /// Command name preceding the colon.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed argument list.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// First argument, when present.
    #[must_use]
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("state:\n", "state", &[])]
    #[case("spin_up:demo\n", "spin_up", &["demo"])]
    #[case("spin_up: demo.conf ,\teu-west \n", "spin_up", &["demo.conf", "eu-west"])]
    #[case("spin_up:,,,\n", "spin_up", &[])]
    #[case(":\n", "", &[])]
    fn parses_name_and_arguments(
        #[case] line: &str,
        #[case] name: &str,
        #[case] args: &[&str],
    ) {
        let request = Request::parse(line).expect("parse request");
        assert_eq!(request.name(), name);
        assert_eq!(request.args(), args);
    }

    #[test]
    fn rejects_line_without_colon() {
        assert_eq!(
            Request::parse("state\n"),
            Err(RequestParseError::MissingSeparator)
        );
    }

    #[test]
    fn newline_is_optional() {
        let request = Request::parse("whoami:").expect("parse request");
        assert_eq!(request.name(), "whoami");
        assert!(request.args().is_empty());
    }
}
