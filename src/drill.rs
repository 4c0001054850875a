use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DrillError {
    #[error("rover is already drilling ({remaining:?} left)")]
    AlreadyDrilling { remaining: Duration },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrillState {
    Idle,
    Drilling { since: Instant },
}

/// One fixed-length drill session at a time. A session cannot be aborted.
#[derive(Debug)]
pub struct DrillController {
    state: DrillState,
    duration: Duration,
}

impl DrillController {
    pub fn new(duration: Duration) -> Self {
        Self { state: DrillState::Idle, duration }
    }

    pub fn state(&self) -> DrillState {
        self.state
    }

    /// Idle -> Drilling. Rejected while a session is still running at `now`.
    pub fn start(&mut self, now: Instant) -> Result<(), DrillError> {
        self.tick(now);
        if let DrillState::Drilling { since } = self.state {
            let remaining = self.duration - now.saturating_duration_since(since);
            return Err(DrillError::AlreadyDrilling { remaining });
        }
        self.state = DrillState::Drilling { since: now };
        Ok(())
    }

    /// Drilling -> Idle once the session has run its full duration.
    pub fn tick(&mut self, now: Instant) {
        if let DrillState::Drilling { since } = self.state {
            if now.saturating_duration_since(since) >= self.duration {
                self.state = DrillState::Idle;
            }
        }
    }

    pub fn is_drilling(&self, now: Instant) -> bool {
        match self.state {
            DrillState::Idle => false,
            DrillState::Drilling { since } => now.saturating_duration_since(since) < self.duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: Duration = Duration::from_secs(2);

    #[test]
    fn flag_clears_after_exactly_the_duration() {
        let t0 = Instant::now();
        let mut drill = DrillController::new(SESSION);
        drill.start(t0).unwrap();

        assert!(drill.is_drilling(t0));
        assert!(drill.is_drilling(t0 + SESSION - Duration::from_millis(1)));
        assert!(!drill.is_drilling(t0 + SESSION));

        drill.tick(t0 + SESSION - Duration::from_nanos(1));
        assert_eq!(drill.state(), DrillState::Drilling { since: t0 });
        drill.tick(t0 + SESSION);
        assert_eq!(drill.state(), DrillState::Idle);
    }

    #[test]
    fn second_start_is_rejected_while_drilling() {
        let t0 = Instant::now();
        let mut drill = DrillController::new(SESSION);
        drill.start(t0).unwrap();

        let err = drill.start(t0 + Duration::from_millis(500)).unwrap_err();
        assert_eq!(
            err,
            DrillError::AlreadyDrilling { remaining: Duration::from_millis(1500) }
        );
        // The rejected request does not extend the running session.
        assert!(!drill.is_drilling(t0 + SESSION));
    }

    #[test]
    fn can_start_again_once_the_session_ends() {
        let t0 = Instant::now();
        let mut drill = DrillController::new(SESSION);
        drill.start(t0).unwrap();
        drill.start(t0 + SESSION).unwrap();
        assert_eq!(drill.state(), DrillState::Drilling { since: t0 + SESSION });
    }
}
