use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What the store is doing right now.
///
/// This is the only concurrency gate in the engine: a backend call is issued
/// only by whoever moved the status out of `Idle`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    BackgroundFetching,
    Mutating,
    Error(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl RequestStatus {
    pub fn name(&self) -> &'static str {
        match self {
            RequestStatus::Idle => "idle",
            RequestStatus::Loading => "loading",
            RequestStatus::BackgroundFetching => "background_fetching",
            RequestStatus::Mutating => "mutating",
            RequestStatus::Error(_) => "error",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RequestStatus::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RequestStatus::Loading)
    }

    pub fn has_error(&self) -> bool {
        matches!(self, RequestStatus::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            RequestStatus::Error(message) => Some(message),
            _ => None,
        }
    }

    /// A backend call owned by this status is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            RequestStatus::Loading | RequestStatus::BackgroundFetching | RequestStatus::Mutating
        )
    }

    pub fn can_transition_to_loading(&self) -> bool {
        matches!(
            self,
            RequestStatus::Idle | RequestStatus::BackgroundFetching | RequestStatus::Error(_)
        )
    }

    pub fn can_transition_to_background_fetching(&self) -> bool {
        self.is_idle()
    }

    pub fn can_transition_to_mutating(&self) -> bool {
        self.is_idle()
    }

    pub fn begin_loading(&mut self) -> Result<(), StatusError> {
        self.transition(self.can_transition_to_loading(), RequestStatus::Loading)
    }

    pub fn begin_background_fetch(&mut self) -> Result<(), StatusError> {
        self.transition(
            self.can_transition_to_background_fetching(),
            RequestStatus::BackgroundFetching,
        )
    }

    pub fn begin_mutation(&mut self) -> Result<(), StatusError> {
        self.transition(self.can_transition_to_mutating(), RequestStatus::Mutating)
    }

    /// In-flight work finished successfully.
    pub fn settle(&mut self) -> Result<(), StatusError> {
        self.transition(self.is_in_flight(), RequestStatus::Idle)
    }

    /// In-flight work failed and the failure must stay visible.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), StatusError> {
        let message = message.into();
        self.transition(self.is_in_flight(), RequestStatus::Error(message))
    }

    pub fn clear_error(&mut self) -> Result<(), StatusError> {
        self.transition(self.has_error(), RequestStatus::Idle)
    }

    fn transition(&mut self, allowed: bool, next: RequestStatus) -> Result<(), StatusError> {
        if !allowed {
            return Err(StatusError::InvalidTransition {
                from: self.name(),
                to: next.name(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Error(message) => write!(f, "error: {message}"),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(RequestStatus::default(), RequestStatus::Idle);
    }

    #[test]
    fn mutation_only_from_idle() {
        let mut s = RequestStatus::Idle;
        s.begin_mutation().unwrap();
        assert_eq!(s, RequestStatus::Mutating);

        assert_eq!(
            s.begin_mutation(),
            Err(StatusError::InvalidTransition {
                from: "mutating",
                to: "mutating"
            })
        );
        assert!(s.begin_background_fetch().is_err());
        assert!(s.begin_loading().is_err());
        assert_eq!(s, RequestStatus::Mutating);
    }

    #[test]
    fn background_fetch_excludes_mutation() {
        let mut s = RequestStatus::Idle;
        s.begin_background_fetch().unwrap();
        assert!(s.begin_mutation().is_err());
        assert!(s.begin_background_fetch().is_err());
        s.settle().unwrap();
        assert!(s.is_idle());
    }

    #[test]
    fn loading_allowed_from_idle_fetch_and_error() {
        for mut s in [
            RequestStatus::Idle,
            RequestStatus::BackgroundFetching,
            RequestStatus::Error("x".into()),
        ] {
            s.begin_loading().unwrap();
            assert!(s.is_loading());
        }
    }

    #[test]
    fn error_is_sticky_until_cleared() {
        let mut s = RequestStatus::Mutating;
        s.fail("Could not delete").unwrap();
        assert!(s.has_error());
        assert_eq!(s.error_message(), Some("Could not delete"));

        assert!(s.begin_mutation().is_err());
        assert!(s.begin_background_fetch().is_err());
        assert!(s.settle().is_err());

        s.clear_error().unwrap();
        assert!(s.is_idle());
        assert!(s.clear_error().is_err());
    }

    #[test]
    fn settle_requires_in_flight_work() {
        let mut s = RequestStatus::Idle;
        assert!(s.settle().is_err());
        assert!(s.fail("nope").is_err());
    }

    #[test]
    fn display_includes_message() {
        assert_eq!(RequestStatus::Error("boom".into()).to_string(), "error: boom");
        assert_eq!(RequestStatus::BackgroundFetching.to_string(), "background_fetching");
    }
}
