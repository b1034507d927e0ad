// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const fn from_dark_mode(dark: bool) -> Self {
        if dark { Self::Dark } else { Self::Light }
    }

    pub const fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Session and preference state, built once at startup and handed to the UI.
/// Persisting changes is the caller's job; this only holds the current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    user: Option<String>,
    pub theme: Theme,
    pub stats_year: i32,
    pub check_duplicates: bool,
}

impl AppContext {
    pub fn new(user: Option<String>, theme: Theme, stats_year: i32) -> Self {
        Self {
            user: user.filter(|name| !name.trim().is_empty()),
            theme,
            stats_year,
            check_duplicates: true,
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Returns the operator name, or an error telling the caller to log in.
    pub fn require_user(&self) -> Result<&str> {
        match self.user() {
            Some(user) => Ok(user),
            None => bail!("no active session -- log in and retry"),
        }
    }

    pub fn login(&mut self, name: &str) -> Result<&str> {
        let name = name.trim();
        if name.is_empty() {
            bail!("username is required -- enter a name and retry");
        }
        let stored = self.user.insert(name.to_owned());
        Ok(stored.as_str())
    }

    pub fn logout(&mut self) -> Option<String> {
        self.user.take()
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }
}

#[cfg(test)]
mod tests {
    use super::{AppContext, Theme};

    #[test]
    fn blank_stored_user_is_treated_as_logged_out() {
        let context = AppContext::new(Some("  ".to_owned()), Theme::Light, 2025);
        assert!(!context.is_logged_in());
        assert!(context.require_user().is_err());
    }

    #[test]
    fn login_trims_and_logout_clears() {
        let mut context = AppContext::new(None, Theme::Light, 2025);
        assert_eq!(context.login("  alice ").expect("login"), "alice");
        assert_eq!(context.require_user().expect("user"), "alice");
        assert_eq!(context.logout().as_deref(), Some("alice"));
        assert!(context.user().is_none());
    }

    #[test]
    fn empty_login_rejected() {
        let mut context = AppContext::new(None, Theme::Light, 2025);
        let error = context.login("").expect_err("blank name");
        assert!(error.to_string().contains("username is required"));
    }

    #[test]
    fn theme_toggles() {
        let mut context = AppContext::new(None, Theme::from_dark_mode(true), 2025);
        assert!(context.theme.is_dark());
        assert_eq!(context.toggle_theme(), Theme::Light);
    }
}
