//! Side effect fired when the caller has to authenticate again.

use std::sync::Mutex;

/// Hook invoked on authentication failure and sign-out.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, reason: &str);
}

/// Logs the login target instead of navigating.
#[derive(Debug, Clone)]
pub struct TracingLoginRedirect {
    login_url: String,
}

impl TracingLoginRedirect {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

impl LoginRedirect for TracingLoginRedirect {
    fn redirect_to_login(&self, reason: &str) {
        tracing::info!(login_url = %self.login_url, reason = %reason, "Redirecting to login");
    }
}

/// Records every redirect reason. Useful in tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingLoginRedirect {
    reasons: Mutex<Vec<String>>,
}

impl RecordingLoginRedirect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.reasons.lock().unwrap_or_else(|err| err.into_inner()).len()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap_or_else(|err| err.into_inner()).clone()
    }
}

impl LoginRedirect for RecordingLoginRedirect {
    fn redirect_to_login(&self, reason: &str) {
        self.reasons
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(reason.to_string());
    }
}
