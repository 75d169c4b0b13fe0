use tracing::info;

/// Whether the client is currently sending samples to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Sampling,
}

/// One polled operator input. `None` means nothing was pressed this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Toggle,
    Snapshot,
    Quit,
    None,
}

/// What the client loop should do after an input has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Continue,
    /// Save a snapshot; `query_status` is set when the snapshot was requested
    /// while sampling, in which case the endpoint status is fetched as well.
    Snapshot { query_status: bool },
    Quit,
}

/// Idle/Sampling state machine driven by operator input.
#[derive(Debug, Default)]
pub struct SampleSession {
    state: SessionState,
}

impl SampleSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_sampling(&self) -> bool {
        self.state == SessionState::Sampling
    }

    pub fn toggle(&mut self) -> SessionState {
        self.state = match self.state {
            SessionState::Idle => SessionState::Sampling,
            SessionState::Sampling => SessionState::Idle,
        };
        info!(state = ?self.state, "sampling toggled");
        self.state
    }

    pub fn dispatch(&mut self, input: InputEvent) -> SessionAction {
        match input {
            InputEvent::Toggle => {
                self.toggle();
                SessionAction::Continue
            }
            InputEvent::Snapshot => SessionAction::Snapshot {
                query_status: self.is_sampling(),
            },
            InputEvent::Quit => SessionAction::Quit,
            InputEvent::None => SessionAction::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(SampleSession::new().state(), SessionState::Idle);
    }

    #[test]
    fn toggle_alternates_between_two_states() {
        let mut session = SampleSession::new();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(session.toggle());
        }
        assert_eq!(
            seen,
            vec![
                SessionState::Sampling,
                SessionState::Idle,
                SessionState::Sampling,
                SessionState::Idle
            ]
        );
    }

    #[test]
    fn snapshot_does_not_change_state() {
        let mut session = SampleSession::new();
        assert_eq!(
            session.dispatch(InputEvent::Snapshot),
            SessionAction::Snapshot { query_status: false }
        );
        assert_eq!(session.state(), SessionState::Idle);

        session.dispatch(InputEvent::Toggle);
        assert_eq!(
            session.dispatch(InputEvent::Snapshot),
            SessionAction::Snapshot { query_status: true }
        );
        assert_eq!(session.state(), SessionState::Sampling);
    }

    #[test]
    fn quit_and_none_keep_state() {
        let mut session = SampleSession::new();
        session.dispatch(InputEvent::Toggle);
        assert_eq!(session.dispatch(InputEvent::None), SessionAction::Continue);
        assert_eq!(session.dispatch(InputEvent::Quit), SessionAction::Quit);
        assert!(session.is_sampling());
    }
}
