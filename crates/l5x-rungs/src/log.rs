use crate::types::DeviceRecord;

/// Trait for values that provide a prefix for log lines
pub trait LogMetadata {
    fn meta(&self) -> String;
}

/// Log context for one spreadsheet row.
pub struct RowContext<'a> {
    pub row: u64,
    pub device_id: &'a str,
    pub device_type: &'a str,
}

impl<'a> RowContext<'a> {
    pub fn of(record: &'a DeviceRecord) -> Self {
        Self {
            row: record.row(),
            device_id: record.id(),
            device_type: record.device_type(),
        }
    }
}

impl LogMetadata for RowContext<'_> {
    fn meta(&self) -> String {
        format!(
            "row={}, device={}, type={}",
            self.row, self.device_id, self.device_type
        )
    }
}

/// Log context for one skeleton document.
pub struct DocumentContext<'a> {
    pub document: &'a str,
}

impl LogMetadata for DocumentContext<'_> {
    fn meta(&self) -> String {
        format!("document={}", self.document)
    }
}

// =============================================
// Logging Macros (namespaced under crate::log)
// =============================================

// ===== l5x_info! =====
macro_rules! l5x_info {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::info!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== l5x_warn! =====
macro_rules! l5x_warn {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::warn!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== l5x_debug! =====
macro_rules! l5x_debug {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::debug!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== l5x_trace! =====
macro_rules! l5x_trace {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::trace!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// Re-export macros for use in other files
pub(crate) use l5x_debug;
pub(crate) use l5x_info;
pub(crate) use l5x_trace;
pub(crate) use l5x_warn;
