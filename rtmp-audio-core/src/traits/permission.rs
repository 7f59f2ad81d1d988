/// Microphone permission as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

/// Invoked once with the outcome of a permission request.
pub type PermissionCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Access to the OS microphone permission system.
pub trait PermissionProvider: Send + Sync {
    fn status(&self) -> PermissionStatus;

    /// Ask the user for microphone access.
    ///
    /// The callback may run on any thread, possibly before this returns.
    fn request(&self, on_result: PermissionCallback);
}
