//! Unlock chime playback using Kira
//!
//! Sound is strictly best-effort: a missing audio device or sound file
//! disables the chime without affecting unlocks or toasts.

mod chime;

pub use chime::KiraChime;

/// Plays the short sting that accompanies a toast batch.
pub trait UnlockChime: Send + Sync {
    /// Fire the chime. Implementations must return promptly and swallow
    /// their own failures.
    fn play(&self);
}

/// Chime that stays silent. Useful for tests and headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChime;

impl UnlockChime for NullChime {
    fn play(&self) {}
}
