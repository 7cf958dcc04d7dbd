use std::fmt::{Display, Formatter};
use std::process::Command;

/// Wake-lock failures. Both are non-fatal; they surface as status messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WakeLockError {
    Unsupported,
    RequestFailed(String),
}

impl Display for WakeLockError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            WakeLockError::Unsupported => write!(f, "Wake lock is not supported on this device"),
            WakeLockError::RequestFailed(msg) => write!(f, "Wake lock request failed: {}", msg),
        }
    }
}

/// Platform capability keeping the display awake while held.
pub trait WakeLock: Send {
    fn acquire(&mut self) -> Result<(), WakeLockError>;
    fn release(&mut self);
}

/// Wake lock via the Termux:API `termux-wake-lock` command.
pub struct TermuxWakeLock;

impl TermuxWakeLock {
    pub fn new() -> Self {
        TermuxWakeLock
    }

    pub fn available() -> bool {
        Command::new("termux-wake-lock").arg("-h").output().is_ok()
    }
}

impl Default for TermuxWakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for TermuxWakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        match Command::new("termux-wake-lock").output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(WakeLockError::RequestFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            Err(e) => Err(WakeLockError::RequestFailed(e.to_string())),
        }
    }

    fn release(&mut self) {
        let _ = Command::new("termux-wake-unlock").output();
    }
}

impl WakeLock for Box<dyn WakeLock> {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        (**self).acquire()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Stand-in when the platform has no wake-lock capability.
pub struct UnsupportedWakeLock;

impl WakeLock for UnsupportedWakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        Err(WakeLockError::Unsupported)
    }

    fn release(&mut self) {}
}

/// Tracks wake-lock intent across visibility changes.
///
/// The platform drops the lock automatically whenever the page goes hidden,
/// so a lock that was held must be re-acquired when visibility returns.
pub struct WakeLockSession<W: WakeLock> {
    lock: W,
    held: bool,
}

impl<W: WakeLock> WakeLockSession<W> {
    pub fn new(lock: W) -> Self {
        WakeLockSession { lock, held: false }
    }

    pub fn held(&self) -> bool {
        self.held
    }

    pub fn acquire(&mut self) -> Result<(), WakeLockError> {
        self.lock.acquire()?;
        self.held = true;
        Ok(())
    }

    pub fn release(&mut self) {
        if self.held {
            self.lock.release();
            self.held = false;
        }
    }

    /// Visibility notification from the host. Returns the result of a
    /// re-acquire attempt when one was needed, `None` otherwise.
    pub fn on_visibility(&mut self, visible: bool) -> Option<Result<(), WakeLockError>> {
        if visible && self.held {
            Some(self.lock.acquire())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingLock {
        acquires: u32,
        releases: u32,
        fail: bool,
    }

    impl CountingLock {
        fn new() -> Self {
            CountingLock {
                acquires: 0,
                releases: 0,
                fail: false,
            }
        }
    }

    impl WakeLock for CountingLock {
        fn acquire(&mut self) -> Result<(), WakeLockError> {
            if self.fail {
                return Err(WakeLockError::RequestFailed("nope".to_string()));
            }
            self.acquires += 1;
            Ok(())
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }

    #[test]
    fn test_reacquire_on_visibility_restore() {
        let mut session = WakeLockSession::new(CountingLock::new());
        session.acquire().unwrap();

        // Hidden: platform drops the lock on its own, nothing for us to do
        assert!(session.on_visibility(false).is_none());
        // Visible again: must re-request
        assert!(matches!(session.on_visibility(true), Some(Ok(()))));
        assert_eq!(session.lock.acquires, 2);
    }

    #[test]
    fn test_no_reacquire_when_never_held() {
        let mut session = WakeLockSession::new(CountingLock::new());
        assert!(session.on_visibility(true).is_none());
        assert_eq!(session.lock.acquires, 0);
    }

    #[test]
    fn test_failed_acquire_leaves_not_held() {
        let mut lock = CountingLock::new();
        lock.fail = true;
        let mut session = WakeLockSession::new(lock);
        assert!(session.acquire().is_err());
        assert!(!session.held());
    }

    #[test]
    fn test_release_only_when_held() {
        let mut session = WakeLockSession::new(CountingLock::new());
        session.release();
        assert_eq!(session.lock.releases, 0);

        session.acquire().unwrap();
        session.release();
        assert_eq!(session.lock.releases, 1);
        assert!(!session.held());
    }

    #[test]
    fn test_unsupported_lock_reports_unsupported() {
        let mut session = WakeLockSession::new(UnsupportedWakeLock);
        assert_eq!(session.acquire(), Err(WakeLockError::Unsupported));
        assert!(!session.held());
    }
}
