//! Fixed-answer microphone permission.
//!
//! Stands in for the OS prompt. An undetermined provider flips to its
//! configured answer the first time access is requested, the way the
//! mobile permission dialogs behave after the user taps once.

use parking_lot::Mutex;

use rtmp_audio_core::traits::permission::{PermissionCallback, PermissionProvider, PermissionStatus};

pub struct StaticPermission {
    status: Mutex<PermissionStatus>,
    answer: bool,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self::with_status(PermissionStatus::Granted, true)
    }

    pub fn denied() -> Self {
        Self::with_status(PermissionStatus::Denied, false)
    }

    /// Not yet asked; a request resolves to `answer`.
    pub fn undetermined(answer: bool) -> Self {
        Self::with_status(PermissionStatus::Undetermined, answer)
    }

    fn with_status(status: PermissionStatus, answer: bool) -> Self {
        Self {
            status: Mutex::new(status),
            answer,
        }
    }
}

impl PermissionProvider for StaticPermission {
    fn status(&self) -> PermissionStatus {
        *self.status.lock()
    }

    fn request(&self, on_result: PermissionCallback) {
        let granted = {
            let mut status = self.status.lock();
            if *status == PermissionStatus::Undetermined {
                *status = if self.answer {
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                };
                log::info!("microphone permission prompt answered: {:?}", *status);
            }
            *status == PermissionStatus::Granted
        };
        on_result(granted);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    fn request(provider: &StaticPermission) -> bool {
        let result = Arc::new(AtomicBool::new(false));
        let sink = Arc::clone(&result);
        provider.request(Box::new(move |granted| sink.store(granted, Ordering::SeqCst)));
        result.load(Ordering::SeqCst)
    }

    #[test]
    fn fixed_answers() {
        assert!(request(&StaticPermission::granted()));
        assert!(!request(&StaticPermission::denied()));
    }

    #[test]
    fn undetermined_resolves_on_request() {
        let provider = StaticPermission::undetermined(true);
        assert_eq!(provider.status(), PermissionStatus::Undetermined);
        assert!(request(&provider));
        assert_eq!(provider.status(), PermissionStatus::Granted);

        let provider = StaticPermission::undetermined(false);
        assert!(!request(&provider));
        assert_eq!(provider.status(), PermissionStatus::Denied);
    }
}
