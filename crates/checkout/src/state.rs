//! Payment attempt state machine.

use serde::{Deserialize, Serialize};

/// The state of a payment attempt.
///
/// State transitions:
/// ```text
/// Idle ──► Requesting ──┬──► AwaitingUserAction ──┬──► Completed
///                       │                          ├──► Failed
///                       └──► Failed                └──► Canceled
/// ```
///
/// A new request may start from `Idle` or from any terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentState {
    /// No attempt has been made, or the last one was reset.
    #[default]
    Idle,

    /// Waiting for the backend to issue a payment session.
    Requesting,

    /// The hosted payment sheet is open.
    AwaitingUserAction,

    /// Payment went through (terminal state).
    Completed,

    /// The backend or the sheet reported a failure (terminal state).
    Failed,

    /// The user dismissed the sheet (terminal state).
    Canceled,
}

impl PaymentState {
    /// Returns true while an attempt is live.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PaymentState::Requesting | PaymentState::AwaitingUserAction
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Completed | PaymentState::Failed | PaymentState::Canceled
        )
    }

    /// Returns true if a new attempt may start.
    pub fn can_request(&self) -> bool {
        !self.is_in_flight()
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Idle => "Idle",
            PaymentState::Requesting => "Requesting",
            PaymentState::AwaitingUserAction => "AwaitingUserAction",
            PaymentState::Completed => "Completed",
            PaymentState::Failed => "Failed",
            PaymentState::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
