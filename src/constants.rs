//! Application-wide constants for shellbridge.
//!
//! # Categories
//!
//! - **WebSocket**: Close codes
//! - **Console**: Input polling and fallback geometry
//! - **Files**: Config and log locations

use std::time::Duration;

// ============================================================================
// WebSocket
// ============================================================================

/// Normal closure, sent when the client asks to close.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Reported when the peer sent a close frame without a status code.
pub const NO_STATUS_CLOSE_CODE: u16 = 1005;

/// Abnormal closure: the connection dropped or failed without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

// ============================================================================
// Console
// ============================================================================

/// How long the console input loop blocks before re-checking the shutdown flag.
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Width used when the console size cannot be queried.
pub const DEFAULT_COLUMNS: u16 = 80;

/// Height used when the console size cannot be queried.
pub const DEFAULT_ROWS: u16 = 24;

// ============================================================================
// Files
// ============================================================================

/// Directory name under the platform config dir.
pub const APP_DIR_NAME: &str = "shellbridge";

/// Configuration file name inside the config dir.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default log file name inside the config dir.
pub const LOG_FILE_NAME: &str = "shellbridge.log";
