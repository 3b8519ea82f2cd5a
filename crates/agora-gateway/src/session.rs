use std::fmt;

/// Lifecycle of one channel connection.
///
/// ```text
/// Connecting -> Authenticating -> AuthorizingJoin -> Joined -> Active -> Closing -> Closed
///                     |                  |             |         |
///                     +------------------+-------------+---------+--> Closing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    AuthorizingJoin,
    Joined,
    Active,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport handshake accepted
    Accepted,
    /// Token verified and subject loaded
    Authenticated,
    /// Read permission granted and channel usable
    JoinGranted,
    /// Registered, welcomed and announced
    Activated,
    /// One inbound frame processed (sent, ignored or refused)
    FrameHandled,
    /// Any terminating cause: refusal, peer close, fault or cancellation
    Close,
    /// Cleanup finished
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: SessionEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} does not accept {:?}", self.from, self.event)
    }
}

impl std::error::Error for InvalidTransition {}

impl SessionState {
    pub fn next(self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        use SessionEvent as E;
        use SessionState as S;

        let next = match (self, event) {
            (S::Connecting, E::Accepted) => S::Authenticating,
            (S::Authenticating, E::Authenticated) => S::AuthorizingJoin,
            (S::AuthorizingJoin, E::JoinGranted) => S::Joined,
            (S::Joined, E::Activated) => S::Active,
            (S::Active, E::FrameHandled) => S::Active,
            (S::Closing, E::Released) => S::Closed,
            (S::Closing | S::Closed, E::Close) => {
                return Err(InvalidTransition { from: self, event });
            }
            (_, E::Close) => S::Closing,
            _ => return Err(InvalidTransition { from: self, event }),
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionEvent as E;
    use super::SessionState as S;
    use super::*;

    #[test]
    fn happy_path() {
        let mut state = S::Connecting;
        for event in [
            E::Accepted,
            E::Authenticated,
            E::JoinGranted,
            E::Activated,
            E::FrameHandled,
            E::FrameHandled,
            E::Close,
            E::Released,
        ] {
            state = state.next(event).unwrap();
        }
        assert_eq!(state, S::Closed);
    }

    #[test]
    fn every_live_state_can_close() {
        for state in [S::Connecting, S::Authenticating, S::AuthorizingJoin, S::Joined, S::Active] {
            assert_eq!(state.next(E::Close).unwrap(), S::Closing);
        }
    }

    #[test]
    fn closed_is_reached_once() {
        assert!(S::Closed.next(E::Close).is_err());
        assert!(S::Closed.next(E::Released).is_err());
        assert!(S::Closing.next(E::Close).is_err());
    }

    #[test]
    fn steps_cannot_be_skipped() {
        assert!(S::Authenticating.next(E::JoinGranted).is_err());
        assert!(S::AuthorizingJoin.next(E::FrameHandled).is_err());
        assert!(S::Joined.next(E::FrameHandled).is_err());
        assert!(S::Active.next(E::Released).is_err());
    }
}
