//! `SessionDriver` backed by a browser through WebDriver
//!
//! Follows the session site's flow: enter the session id on the landing page,
//! get bounced to the single sign-on page when not logged in, log in, and land
//! on the join page showing the current question.

use async_trait::async_trait;
use sdk::driver::{Credentials, DriverError, JoinOutcome, SessionDriver};
use sdk::errors::EngineError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::protocol::{WebDriverClient, ENTER_KEY};
use crate::config::SessionConfig;

const SESSION_ID_INPUT: &str = "#sessionid";
const USERNAME_INPUT: &str = "#userNameInput";
const PASSWORD_INPUT: &str = "#passwordInput";
const TEXT_INPUT: &str = "textarea.mdl-textfield__input";
const TEXT_SUBMIT: &str = "button.text_btn";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser-backed session driver
pub struct WebDriverSession {
    client: WebDriverClient,
    config: SessionConfig,
    session: Option<String>,
    credentials: Option<Credentials>,
    poll_interval: Duration,
}

impl WebDriverSession {
    pub fn new(config: &SessionConfig) -> Result<Self, EngineError> {
        let client = WebDriverClient::new(
            &config.webdriver_url,
            Duration::from_secs(config.command_timeout_secs),
        )?;

        Ok(Self {
            client,
            config: config.clone(),
            session: None,
            credentials: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// How often page state is re-checked while waiting.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn session(&self) -> Result<&str, DriverError> {
        self.session
            .as_deref()
            .ok_or_else(|| DriverError::SessionLost("no browser session".to_string()))
    }

    fn page_wait(&self) -> Duration {
        Duration::from_secs(self.config.page_wait_secs)
    }

    fn is_login_page(&self, url: &str) -> bool {
        url.starts_with(&self.config.login_url_prefix)
    }

    fn is_site_root(&self, url: &str) -> bool {
        url.trim_end_matches('/') == self.config.site_url.trim_end_matches('/')
    }

    /// Wait for an element to appear and return its id.
    async fn wait_for_element(&self, selector: &str) -> Result<String, DriverError> {
        let session = self.session()?;
        let deadline = Instant::now() + self.page_wait();

        loop {
            match self.client.find_element(session, selector).await {
                Ok(element) => return Ok(element),
                Err(DriverError::ElementNotFound(_)) if Instant::now() < deadline => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(DriverError::ElementNotFound(_)) => {
                    return Err(DriverError::Timeout(format!("element '{}'", selector)))
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait until the current URL satisfies `done`. Returns the URL, or
    /// `None` if the page wait ran out.
    async fn wait_for_url<F>(&self, done: F) -> Result<Option<String>, DriverError>
    where
        F: Fn(&str) -> bool,
    {
        let session = self.session()?;
        let deadline = Instant::now() + self.page_wait();

        loop {
            let url = self.client.current_url(session).await?;
            if done(&url) {
                return Ok(Some(url));
            }
            if Instant::now() >= deadline {
                debug!("Gave up waiting at {}", url);
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Fill in the sign-on form and wait to be let through.
    async fn log_in(&self) -> Result<(), DriverError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            DriverError::AuthenticationRequired("no credentials to log in with".to_string())
        })?;
        let session = self.session()?;

        info!("Redirected to the login page; logging in as {}", credentials.login_id);
        let username = self.wait_for_element(USERNAME_INPUT).await?;
        self.client
            .send_keys(session, &username, &credentials.login_id)
            .await?;

        let password = self.client.find_element(session, PASSWORD_INPUT).await?;
        self.client
            .send_keys(session, &password, credentials.password.unsecure())
            .await?;
        self.client.send_keys(session, &password, ENTER_KEY).await?;

        match self.wait_for_url(|url| !self.is_login_page(url)).await? {
            Some(_) => Ok(()),
            None => Err(DriverError::AuthenticationRequired(
                "still on the login page after submitting credentials".to_string(),
            )),
        }
    }

    async fn text_input(&self) -> Result<String, DriverError> {
        self.client.find_element(self.session()?, TEXT_INPUT).await
    }
}

#[async_trait]
impl SessionDriver for WebDriverSession {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), DriverError> {
        if let Some(old) = self.session.take() {
            if let Err(e) = self.client.delete_session(&old).await {
                debug!("Discarding old browser session failed: {}", e);
            }
        }

        let session = self.client.new_session(self.config.headless).await?;
        info!("Opened browser session {}", session);
        self.session = Some(session);
        self.credentials = Some(credentials.clone());

        self.client
            .navigate(self.session()?, &self.config.site_url)
            .await?;

        // The site only asks for a login once a session id is entered; when it
        // asks up front, log in now
        match self.wait_for_url(|url| self.is_login_page(url)).await? {
            Some(_) => self.log_in().await,
            None => {
                debug!("No login redirect yet; logging in when a session asks for it");
                Ok(())
            }
        }
    }

    async fn join_session(&mut self, session_id: &str) -> Result<JoinOutcome, DriverError> {
        let session = self.session()?.to_string();

        self.client.navigate(&session, &self.config.site_url).await?;
        let input = self.wait_for_element(SESSION_ID_INPUT).await?;
        self.client.send_keys(&session, &input, session_id).await?;
        self.client.send_keys(&session, &input, ENTER_KEY).await?;

        let joined = |url: &str| url == self.config.joined_url;

        let mut landed = self
            .wait_for_url(|url| joined(url) || self.is_login_page(url))
            .await?;

        if landed.as_deref().map_or(false, |url| self.is_login_page(url)) {
            self.log_in().await?;
            landed = self.wait_for_url(joined).await?;
        }

        if landed.is_some() {
            self.wait_for_element("body").await?;
            info!("Joined session {}", session_id);
            return Ok(JoinOutcome::Joined);
        }

        let current = self.client.current_url(&session).await?;
        if self.is_site_root(&current) {
            Ok(JoinOutcome::SessionInvalidOrEnded)
        } else if self.is_login_page(&current) {
            Err(DriverError::SessionLost(
                "sent back to the login page".to_string(),
            ))
        } else {
            Err(DriverError::UnexpectedPage(current))
        }
    }

    async fn submit_choice(&mut self, letter: char) -> Result<(), DriverError> {
        let selector = format!("button.choice_{}", letter.to_ascii_lowercase());
        let button = self.wait_for_element(&selector).await?;
        self.client.click(self.session()?, &button).await?;
        info!("Answered with choice '{}'", letter);
        Ok(())
    }

    async fn stage_text(&mut self, text: &str) -> Result<(), DriverError> {
        let input = self.wait_for_element(TEXT_INPUT).await?;
        let session = self.session()?;
        self.client.clear(session, &input).await?;
        self.client.send_keys(session, &input, text).await?;
        Ok(())
    }

    async fn read_staged_text(&mut self) -> Result<String, DriverError> {
        let input = self.text_input().await?;
        self.client
            .element_property(self.session()?, &input, "value")
            .await
    }

    async fn submit_staged(&mut self) -> Result<(), DriverError> {
        let button = self.client.find_element(self.session()?, TEXT_SUBMIT).await?;
        self.client.click(self.session()?, &button).await?;
        info!("Submitted typed answer");
        Ok(())
    }

    async fn read_confirmed_answer(&mut self) -> Result<String, DriverError> {
        let element = self
            .wait_for_element(&self.config.confirmed_answer_selector)
            .await?;
        self.client.element_text(self.session()?, &element).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(session) = self.session.take() {
            self.client.delete_session(&session).await?;
            info!("Closed browser session {}", session);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_classification() {
        let driver = WebDriverSession::new(&SessionConfig::default()).unwrap();

        assert!(driver.is_site_root("https://server4.ureply.mobi"));
        assert!(driver.is_site_root("https://server4.ureply.mobi/"));
        assert!(driver.is_login_page("https://sts.cuhk.edu.hk/adfs/ls/?SAMLRequest=abc"));
        assert!(!driver.is_login_page("https://server4.ureply.mobi/student/cads/joinsession.php"));
    }

    #[test]
    fn test_no_session_means_lost() {
        let driver = WebDriverSession::new(&SessionConfig::default()).unwrap();
        assert!(matches!(driver.session(), Err(DriverError::SessionLost(_))));
    }
}
