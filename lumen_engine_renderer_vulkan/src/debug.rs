/// Vulkan debug messenger - routes validation layer messages into the engine log
///
/// Messages below the configured `DebugSeverity` are dropped. Reported
/// messages are counted per severity, and repeats of the same message are
/// tagged with their occurrence count.

use ash::vk;
use lumen_engine::log::{log, LogSeverity};
use lumen_engine::lumen::DebugSeverity;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "lumen::vulkan::validation";

/// Severity filter used by the callback
static DEBUG_SEVERITY: Mutex<DebugSeverity> = Mutex::new(DebugSeverity::ErrorsAndWarnings);

/// Global validation statistics
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Counts of reported validation messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn increment(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Set the severity filter and reset statistics
pub fn init_debug_config(severity: DebugSeverity) {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    if let Ok(mut current) = DEBUG_SEVERITY.lock() {
        *current = severity;
    }
}

/// Current validation statistics
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Log a summary of the validation messages seen since initialization
pub fn log_validation_stats_report() {
    let stats = validation_stats();
    if stats.total() == 0 {
        log(LogSeverity::Info, SOURCE, "No validation messages".to_string());
        return;
    }

    let repeated = MESSAGE_TRACKER
        .lock()
        .ok()
        .and_then(|tracker| tracker.as_ref().map(|t| t.values().filter(|&&count| count > 1).count()))
        .unwrap_or(0);

    let severity = if stats.errors > 0 { LogSeverity::Warn } else { LogSeverity::Info };
    log(
        severity,
        SOURCE,
        format!(
            "Validation report: {} error(s), {} warning(s), {} info, {} verbose ({} repeated)",
            stats.errors, stats.warnings, stats.info, stats.verbose, repeated
        ),
    );
}

// ===== FILTERING AND FORMATTING =====

/// Whether a message of `severity` passes the configured filter
pub(crate) fn should_report(severity: vk::DebugUtilsMessageSeverityFlagsEXT, filter: DebugSeverity) -> bool {
    match filter {
        DebugSeverity::ErrorsOnly => severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
        DebugSeverity::ErrorsAndWarnings => severity.intersects(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        ),
        DebugSeverity::All => true,
    }
}

/// Engine log severity of a validation message
pub(crate) fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Debug
    } else {
        LogSeverity::Trace
    }
}

pub(crate) fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

pub(crate) fn format_message(type_name: &str, message_id: &str, message: &str, occurrences: u32) -> String {
    if occurrences > 1 {
        format!("[{}] [x{}] {}: {}", type_name, occurrences, message_id, message)
    } else {
        format!("[{}] {}: {}", type_name, message_id, message)
    }
}

fn track_message(message: &str) -> u32 {
    let Ok(mut tracker) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let count = tracker
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Filter, count and log one message
pub(crate) fn report_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message_id: &str,
    message: &str,
) {
    let filter = DEBUG_SEVERITY
        .lock()
        .map(|current| *current)
        .unwrap_or(DebugSeverity::ErrorsAndWarnings);
    if !should_report(severity, filter) {
        return;
    }

    VALIDATION_STATS.increment(severity);
    let occurrences = track_message(message);
    log(
        log_severity(severity),
        SOURCE,
        format_message(message_type_name(message_type), message_id, message, occurrences),
    );
}

// ===== MESSENGER =====

/// Messenger create info accepting every severity and type; filtering happens in the callback
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Vulkan debug messenger callback
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;

    let message_id = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    report_message(message_severity, message_type, &message_id, &message);

    // Never abort the Vulkan call
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
