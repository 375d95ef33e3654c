use bulwark_core::{AppError, AppResult, NonEmptyString};

/// Configuration for a rate limit rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    action: NonEmptyString,
    max_attempts: u32,
    window_minutes: u32,
}

impl RateLimitRule {
    /// Default attempts allowed per window.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    /// Default window length in minutes.
    pub const DEFAULT_WINDOW_MINUTES: u32 = 15;
    /// Longest accepted action name.
    pub const MAX_ACTION_LENGTH: usize = 64;

    /// Creates a new rate limit rule for a named action (e.g. "newsletter_signup").
    pub fn new(action: impl Into<String>, max_attempts: u32, window_minutes: u32) -> AppResult<Self> {
        let action = NonEmptyString::new(action)
            .map_err(|_| AppError::Validation("rate limit action must not be empty".to_owned()))?;

        let valid_name = action.as_str().len() <= Self::MAX_ACTION_LENGTH
            && action
                .as_str()
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || "_-.:".contains(character));
        if !valid_name {
            return Err(AppError::Validation(format!(
                "rate limit action must be at most {} characters of [A-Za-z0-9_.:-]",
                Self::MAX_ACTION_LENGTH
            )));
        }

        if max_attempts == 0 || window_minutes == 0 {
            return Err(AppError::Validation(
                "rate limit attempts and window must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            action,
            max_attempts,
            window_minutes,
        })
    }

    /// Creates a rule with the default limits.
    pub fn with_defaults(action: impl Into<String>) -> AppResult<Self> {
        Self::new(
            action,
            Self::DEFAULT_MAX_ATTEMPTS,
            Self::DEFAULT_WINDOW_MINUTES,
        )
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Returns the attempts allowed per window.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the window length in minutes.
    #[must_use]
    pub fn window_minutes(&self) -> u32 {
        self.window_minutes
    }

    /// Message shown to a caller who hit this limit.
    #[must_use]
    pub fn denial_message(&self) -> String {
        format!(
            "Too many attempts. Please wait {} minutes before trying again.",
            self.window_minutes
        )
    }
}
