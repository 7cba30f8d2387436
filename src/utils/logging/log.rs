//! Logging utilities
//!
//! This module provides standardized logging functions for operations.

use std::fmt::Display;
use std::time::Duration;

/// Log an operation start with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `subject` - What the operation works on
pub fn log_operation_start(operation: &str, subject: impl Display) {
    log::info!("{operation} {subject}");
}

/// Log an operation completion with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `subject` - What the operation worked on
/// * `items` - Number of items produced
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    operation: &str,
    subject: impl Display,
    items: usize,
    elapsed: Option<Duration>,
) {
    if let Some(duration) = elapsed {
        log::info!("Successfully {operation} {items} items from {subject} in {duration:?}");
    } else {
        log::info!("Successfully {operation} {items} items from {subject}");
    }
}

/// Log an operation warning with consistent format
///
/// # Arguments
/// * `message` - Warning message
/// * `subject` - Optional subject related to the warning
pub fn log_warning(message: &str, subject: Option<&dyn Display>) {
    if let Some(subject) = subject {
        log::warn!("{message}: {subject}");
    } else {
        log::warn!("{message}");
    }
}
