use keyring::Entry;
use sdk::driver::Credentials;
use sdk::errors::EngineError;
use sdk::secret::SecretString;
use std::io::{self, Write};

/// Keychain service name for all attendant secrets
pub const SERVICE_NAME: &str = "attendant";

/// Keychain key of the single sign-on login id
pub const LOGIN_ID_KEY: &str = "sso_login_id";

/// Keychain key of the single sign-on password
pub const PASSWORD_KEY: &str = "sso_password";

/// SecretManager handles secure storage and retrieval of secrets using the OS keychain.
///
/// Secrets are stored in:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// When a secret is not found, the user is prompted interactively and the value
/// is immediately stored in the keychain for future use.
pub struct SecretManager {
    service_name: String,
}

impl SecretManager {
    /// Creates a new SecretManager with the given service name.
    ///
    /// The service name is used to namespace secrets in the OS keychain.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, EngineError> {
        Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })
    }

    /// Retrieves a secret from the OS keychain.
    ///
    /// If the secret is not found, prompts the user interactively and stores
    /// the provided value in the keychain immediately. Values for keys marked
    /// `hidden` are read without echo.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if keychain access fails
    pub fn get_secret(&self, key: &str, hidden: bool) -> Result<SecretString, EngineError> {
        match self.entry(key)?.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(SecretString::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::info!("Secret '{}' not found in keychain, prompting user", key);
                let secret = prompt_for_secret(key, hidden)?;

                self.set_secret(key, secret.unsecure())?;

                Ok(secret)
            }
            Err(e) => Err(EngineError::KeyringError(format!(
                "Failed to retrieve secret '{}': {}",
                key, e
            ))),
        }
    }

    /// Stores a secret in the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.entry(key)?.set_password(value).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Checks if a secret exists in the OS keychain without prompting.
    pub fn has_secret(&self, key: &str) -> bool {
        match self.entry(key) {
            Ok(entry) => entry.get_password().is_ok(),
            Err(_) => false,
        }
    }

    /// Login id and password for the single sign-on page, prompting for
    /// whatever the keychain does not hold yet.
    pub fn load_credentials(&self) -> Result<Credentials, EngineError> {
        let login_id = self.get_secret(LOGIN_ID_KEY, false)?;
        let password = self.get_secret(PASSWORD_KEY, true)?;

        Ok(Credentials::new(login_id.unsecure(), password))
    }

    /// Prompt for fresh credentials and store them, replacing old values.
    pub fn store_credentials(&self) -> Result<(), EngineError> {
        let login_id = prompt_for_secret(LOGIN_ID_KEY, false)?;
        let password = prompt_for_secret(PASSWORD_KEY, true)?;

        self.set_secret(LOGIN_ID_KEY, login_id.unsecure())?;
        self.set_secret(PASSWORD_KEY, password.unsecure())?;
        Ok(())
    }
}

impl Default for SecretManager {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

/// Prompts the user for a secret value on stderr.
///
/// Hidden values are read without echo.
fn prompt_for_secret(key: &str, hidden: bool) -> Result<SecretString, EngineError> {
    let prompt = format!("Enter value for '{}': ", key);

    let input = if hidden {
        rpassword::prompt_password_stderr(&prompt)
            .map_err(|e| EngineError::KeyringError(format!("Failed to read input: {}", e)))?
    } else {
        eprint!("{}", prompt);
        io::stderr()
            .flush()
            .map_err(|e| EngineError::KeyringError(format!("Failed to flush stderr: {}", e)))?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| EngineError::KeyringError(format!("Failed to read input: {}", e)))?;
        input
    };

    // Login ids are trimmed; passwords are taken as typed
    let secret = if hidden {
        SecretString::from_prompt(&input)
    } else {
        SecretString::new(input.trim())
    };
    if secret.is_empty() {
        return Err(EngineError::KeyringError(
            "Secret cannot be empty".to_string(),
        ));
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        let manager = SecretManager::default();
        assert_eq!(manager.service_name, SERVICE_NAME);
    }

    #[test]
    fn test_has_secret_for_unknown_key() {
        let manager = SecretManager::new("attendant-test-nonexistent");
        assert!(!manager.has_secret("definitely_not_stored"));
    }
}
