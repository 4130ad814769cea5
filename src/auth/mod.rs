//! Login and two-factor challenge handling.
//!
//! The flow is a small state machine over one page:
//!
//! ```text
//! Anonymous → Checking → { Authenticated, LoginForm }
//!                 LoginForm → { Authenticated, TwoFactorRequired }
//!                 TwoFactorRequired → Authenticated   (enter_auth_code)
//! ```
//!
//! Cookies are persisted through the session store only on confirmed
//! authentication, never on the pure-probe path or on failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::app::{Result, TrawlError};
use crate::config::Config;
use crate::page::{Cookie, PageController};
use crate::session::{cookies_to_json, SessionStore};

const NAV_TIMEOUT: Duration = Duration::from_secs(60);
const CONSENT_TIMEOUT: Duration = Duration::from_secs(2);
const FORM_TIMEOUT: Duration = Duration::from_secs(30);
const TWO_FACTOR_TIMEOUT: Duration = Duration::from_secs(5);
const LANDMARK_TIMEOUT: Duration = Duration::from_secs(30);
/// The confirmation loop can sit on a screen for as long as the user takes
/// to approve the device elsewhere.
const CHALLENGE_NAV_TIMEOUT: Duration = Duration::from_secs(600);
const BLANK_PAGE: &str = "about:blank";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Checking,
    LoginForm,
    TwoFactorRequired,
    Authenticated,
}

/// One login flow over one page.
pub struct Login<P: PageController, S: SessionStore> {
    page: P,
    store: S,
    config: Arc<Config>,
    state: Mutex<AuthState>,
}

impl<P: PageController, S: SessionStore> Login<P, S> {
    pub fn new(page: P, store: S, config: Arc<Config>) -> Self {
        Self {
            page,
            store,
            config,
            state: Mutex::new(AuthState::Anonymous),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock().expect("auth state lock")
    }

    fn set_state(&self, state: AuthState) {
        *self.state.lock().expect("auth state lock") = state;
    }

    /// Authenticate, or probe the current session when called without
    /// credentials.
    ///
    /// Returns the session's cookie set. An already-authenticated session
    /// returns immediately; an anonymous session with no credentials returns
    /// an empty set without touching the login form. A detected two-factor
    /// challenge fails with [`TrawlError::TwoFactorRequired`] and persists
    /// nothing; resume via [`enter_auth_code`](Self::enter_auth_code).
    pub async fn login(&self, credentials: Option<&Credentials>) -> Result<Vec<Cookie>> {
        self.set_state(AuthState::Checking);
        let body = self
            .page
            .goto(&self.config.session.base_url, NAV_TIMEOUT)
            .await?;

        let anonymous = body.contains(&self.config.selectors.login.anonymous_marker);
        if !anonymous {
            info!("session already authenticated");
            self.set_state(AuthState::Authenticated);
            let cookies = self.collect_cookies(false).await?;
            let _ = self.page.goto(BLANK_PAGE, NAV_TIMEOUT).await;
            return Ok(cookies);
        }

        let Some(credentials) = credentials else {
            debug!("anonymous session, no credentials supplied: probe only");
            self.set_state(AuthState::Anonymous);
            let _ = self.page.goto(BLANK_PAGE, NAV_TIMEOUT).await;
            return Ok(Vec::new());
        };

        self.set_state(AuthState::LoginForm);
        self.dismiss_consent().await;
        self.submit_login_form(credentials).await?;

        if self.two_factor_pending().await {
            info!("two-factor challenge detected");
            self.set_state(AuthState::TwoFactorRequired);
            return Err(TrawlError::TwoFactorRequired);
        }

        self.page
            .wait_for_selector(&self.config.selectors.login.landmark, LANDMARK_TIMEOUT)
            .await?;
        info!("login succeeded");
        self.set_state(AuthState::Authenticated);
        let cookies = self.collect_cookies(true).await?;
        let _ = self.page.goto(BLANK_PAGE, NAV_TIMEOUT).await;
        Ok(cookies)
    }

    /// Submit the authenticator code, then keep confirming until the
    /// challenge flow lands back on the application root. The flow can
    /// present any number of sequential confirmation screens; termination is
    /// the final URL, not an iteration count.
    pub async fn enter_auth_code(&self, code: &str) -> Result<Vec<Cookie>> {
        let sel = &self.config.selectors.login;
        self.page.wait_for_selector(&sel.code_input, FORM_TIMEOUT).await?;
        self.page.focus(&sel.code_input).await?;
        self.page.type_text(code).await?;

        self.confirm_challenge().await?;
        self.confirm_challenge().await?;
        loop {
            let url = self.page.wait_for_navigation(CHALLENGE_NAV_TIMEOUT).await?;
            if Url::parse(&url)?.path() == "/" {
                break;
            }
            self.confirm_challenge().await?;
        }

        info!("two-factor challenge cleared");
        self.set_state(AuthState::Authenticated);
        let cookies = self.collect_cookies(true).await?;
        let _ = self.page.goto(BLANK_PAGE, NAV_TIMEOUT).await;
        Ok(cookies)
    }

    /// Best-effort dismissal of the cookie-consent interstitial.
    async fn dismiss_consent(&self) {
        let sel = &self.config.selectors.login;
        if let Ok(button) = self
            .page
            .wait_for_selector(&sel.consent_accept, CONSENT_TIMEOUT)
            .await
        {
            if let Err(error) = self.page.click(&button).await {
                debug!(%error, "consent dismissal failed");
            }
        }
    }

    async fn submit_login_form(&self, credentials: &Credentials) -> Result<()> {
        let sel = &self.config.selectors.login;
        self.page.wait_for_selector(&sel.form, FORM_TIMEOUT).await?;
        self.page.focus(&sel.email).await?;
        self.page.type_text(&credentials.username).await?;
        self.page.focus(&sel.password).await?;
        self.page.type_text(&credentials.password).await?;
        let submit = self.page.wait_for_selector(&sel.submit, FORM_TIMEOUT).await?;
        self.page.click(&submit).await?;
        Ok(())
    }

    async fn two_factor_pending(&self) -> bool {
        self.page
            .wait_for_selector(
                &self.config.selectors.login.two_factor_form,
                TWO_FACTOR_TIMEOUT,
            )
            .await
            .is_ok()
    }

    async fn confirm_challenge(&self) -> Result<()> {
        let submit = self
            .page
            .wait_for_selector(&self.config.selectors.login.code_submit, FORM_TIMEOUT)
            .await?;
        self.page.click(&submit).await
    }

    async fn collect_cookies(&self, save: bool) -> Result<Vec<Cookie>> {
        let cookies = self.page.cookies().await?;
        if save {
            if let Some(ref path) = self.config.session.cookies_file {
                self.store.write(path, &cookies_to_json(&cookies)?)?;
                info!(path = %path.display(), count = cookies.len(), "session cookies persisted");
            }
        }
        Ok(cookies)
    }
}
