//! Shared constants for end-to-end tests

// ============================================================================
// Timeouts
// ============================================================================

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// How long to wait for a live message before failing
pub const LIVE_MESSAGE_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Stub listening data source
// ============================================================================

/// Access token the stub source accepts, any other is rejected as expired
pub const VALID_ACCESS_TOKEN: &str = "valid-spotify-token";

/// Account id the stub source reports for the valid token
pub const STUB_SPOTIFY_ID: &str = "spotify-user-1";

pub const STUB_DISPLAY_NAME: &str = "Stub Listener";
