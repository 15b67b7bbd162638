//! Redacting wrapper for credentials
//!
//! The SSO password travels from the keychain to the login form inside a
//! `SecretString`; formatting it with `{}` or `{:?}` prints a placeholder.

use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// A string that never shows up in logs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Wrap a line typed at a prompt, dropping the line ending only.
    ///
    /// Surrounding spaces are kept: they may be part of a password.
    pub fn from_prompt(line: &str) -> Self {
        Self(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// The raw value, for the one place it is typed into a form.
    pub fn unsecure(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretString")
            .field(&format_args!("{}", REDACTED))
            .finish()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_formatting() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.unsecure(), "hunter2");
    }

    #[test]
    fn test_prompt_line_keeps_inner_spaces() {
        let secret = SecretString::from_prompt(" pass word \r\n");
        assert_eq!(secret.unsecure(), " pass word ");
        assert!(SecretString::from_prompt("\n").is_empty());
    }
}
