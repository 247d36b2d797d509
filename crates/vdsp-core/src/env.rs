//! Environment abstraction for deterministic testing.
//!
//! Decouples the connection/correlator state machines from system resources
//! (time, randomness), so the same logic runs against a real clock and RNG
//! in production and a virtual clock and seeded RNG in tests.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; test environments
    /// may use a virtual clock.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// Subsequent calls must return times >= previous calls within a single
    /// execution context.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait; it should only be called
    /// by the timer wheel, never from inside a pure state-machine method.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG in production
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, used for CoAP message IDs' initial offset
    /// and other non-token randomness.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random 32-bit CoAP token (§4.2 "Tokens are freshly
    /// generated per request with enough entropy to satisfy invariant 3").
    fn random_token(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        bytes
    }
}
