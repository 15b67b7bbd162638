//! Minimal W3C WebDriver client
//!
//! Only the commands the session driver needs: session lifecycle, navigation,
//! element lookup by CSS selector, and a handful of element interactions.
//! Every command runs over one `reqwest::Client` whose timeout bounds each
//! request.

use reqwest::{Client, Method};
use sdk::driver::DriverError;
use sdk::errors::EngineError;
use serde_json::{json, Value};
use std::time::Duration;

/// Key under which W3C responses carry an element reference
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735e7b0ea4";

/// The WebDriver code point for the Enter key
pub const ENTER_KEY: &str = "\u{E007}";

/// HTTP client for a WebDriver endpoint (e.g. chromedriver)
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    base_url: String,
    client: Client,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>, command_timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(command_timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Send one command and return the `value` member of the response.
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!("WebDriver {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DriverError::Timeout(format!("WebDriver command {}", path))
            } else if e.is_connect() {
                DriverError::Transport(format!(
                    "Cannot connect to WebDriver at {}. Is the driver running?",
                    self.base_url
                ))
            } else {
                DriverError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| DriverError::Transport(format!("unreadable WebDriver response: {}", e)))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            Ok(value)
        } else {
            Err(map_protocol_error(status.as_u16(), &value))
        }
    }

    /// Start a browser session and return its id.
    pub async fn new_session(&self, headless: bool) -> Result<String, DriverError> {
        let args: Vec<&str> = if headless {
            vec!["--headless=new"]
        } else {
            Vec::new()
        };
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await?;

        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| DriverError::Transport("new session response has no sessionId".to_string()))
    }

    pub async fn delete_session(&self, session: &str) -> Result<(), DriverError> {
        self.command(Method::DELETE, &format!("/session/{}", session), None)
            .await
            .map(|_| ())
    }

    pub async fn navigate(&self, session: &str, url: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/session/{}/url", session),
            Some(json!({ "url": url })),
        )
        .await
        .map(|_| ())
    }

    pub async fn current_url(&self, session: &str) -> Result<String, DriverError> {
        let value = self
            .command(Method::GET, &format!("/session/{}/url", session), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Find the first element matching a CSS selector and return its id.
    pub async fn find_element(&self, session: &str, selector: &str) -> Result<String, DriverError> {
        let value = self
            .command(
                Method::POST,
                &format!("/session/{}/element", session),
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;

        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))
    }

    pub async fn click(&self, session: &str, element: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/session/{}/element/{}/click", session, element),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    pub async fn clear(&self, session: &str, element: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/session/{}/element/{}/clear", session, element),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    pub async fn send_keys(&self, session: &str, element: &str, text: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/session/{}/element/{}/value", session, element),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    pub async fn element_text(&self, session: &str, element: &str) -> Result<String, DriverError> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/element/{}/text", session, element),
                None,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// A DOM property such as `value` of an input element.
    pub async fn element_property(
        &self,
        session: &str,
        element: &str,
        name: &str,
    ) -> Result<String, DriverError> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/element/{}/property/{}", session, element, name),
                None,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

/// Translate a W3C error response into a driver error.
fn map_protocol_error(status: u16, value: &Value) -> DriverError {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or_default();

    match code {
        "no such element" | "stale element reference" => DriverError::ElementNotFound(message.to_string()),
        "invalid session id" | "no such window" => DriverError::SessionLost(format!("{}: {}", code, message)),
        "timeout" | "script timeout" => DriverError::Timeout(message.to_string()),
        _ => DriverError::Transport(format!("{} ({}): {}", code, status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = map_protocol_error(404, &json!({"error": "no such element", "message": "#sessionid"}));
        assert_eq!(err, DriverError::ElementNotFound("#sessionid".to_string()));

        let err = map_protocol_error(404, &json!({"error": "invalid session id", "message": "gone"}));
        assert!(matches!(err, DriverError::SessionLost(_)));

        let err = map_protocol_error(500, &json!({"error": "unknown error", "message": "boom"}));
        assert!(matches!(err, DriverError::Transport(_)));
    }
}
