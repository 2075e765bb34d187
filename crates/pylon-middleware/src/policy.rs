//! What to do when traffic breaks the contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Failure handling policy.
///
/// | Failure          | `Ignore`                  | `RejectClient`          | `AssertFatal` |
/// |------------------|---------------------------|-------------------------|---------------|
/// | request invalid  | warn, handler still runs  | decoded error response  | panic         |
/// | response invalid | sink event                | sink event              | panic         |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and carry on.
    Ignore,
    /// Answer invalid requests with the decoded error.
    #[default]
    RejectClient,
    /// Panic on any failure; for test suites.
    AssertFatal,
}

impl FailurePolicy {
    /// Panics if this policy is fatal.
    ///
    /// # Panics
    ///
    /// Panics with `could not validate request: {cause}` under `AssertFatal`.
    pub fn assert_request(self, cause: &dyn fmt::Display) {
        if self == Self::AssertFatal {
            panic!("could not validate request: {cause}");
        }
    }

    /// Panics if this policy is fatal.
    ///
    /// # Panics
    ///
    /// Panics with `could not validate response: {cause}` under `AssertFatal`.
    pub fn assert_response(self, cause: &dyn fmt::Display) {
        if self == Self::AssertFatal {
            panic!("could not validate response: {cause}");
        }
    }

    /// Policy name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::RejectClient => "reject_client",
            Self::AssertFatal => "assert_fatal",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicy(pub String);

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown failure policy '{}' (expected ignore, reject_client or assert_fatal)",
            self.0
        )
    }
}

impl std::error::Error for UnknownPolicy {}

impl FromStr for FailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject_client" | "reject" => Ok(Self::RejectClient),
            "assert_fatal" | "fatal" => Ok(Self::AssertFatal),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_reject_client() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::RejectClient);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("ignore".parse::<FailurePolicy>().unwrap(), FailurePolicy::Ignore);
        assert_eq!(
            "Reject-Client".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::RejectClient
        );
        assert_eq!(
            "assert_fatal".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::AssertFatal
        );
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_non_fatal_policies_do_not_panic() {
        FailurePolicy::Ignore.assert_request(&"bad");
        FailurePolicy::RejectClient.assert_response(&"bad");
    }

    #[test]
    #[should_panic(expected = "could not validate request: bad id")]
    fn test_fatal_request_panics() {
        FailurePolicy::AssertFatal.assert_request(&"bad id");
    }

    #[test]
    #[should_panic(expected = "could not validate response: bad body")]
    fn test_fatal_response_panics() {
        FailurePolicy::AssertFatal.assert_response(&"bad body");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&FailurePolicy::AssertFatal).unwrap();
        assert_eq!(json, "\"assert_fatal\"");
        assert_eq!(FailurePolicy::RejectClient.to_string(), "reject_client");
    }
}
