//! Error types for the Lumen engine
//!
//! Every failure crossing the renderer boundary is an [`Error`] value. Each
//! variant maps to a small [`ErrorCode`] which can be translated into a
//! human-readable string through a static lookup table, so the scene layer
//! never has to match on backend details.

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No adapter satisfies the device requirements
    NoSuitableDevice(String),

    /// Window surface could not be created
    SurfaceCreationFailed(String),

    /// Initialization failed (device, swapchain, pipelines, subsystems)
    InitializationFailed(String),

    /// Requested backend is not compiled into this build
    BackendUnavailable(String),

    /// Swapchain no longer matches the window and must be rebuilt
    SurfaceOutOfDate,

    /// Command buffer recording failed; the frame was dropped
    RecordingFailed(String),

    /// Queue submission failed; the frame was dropped
    SubmitFailed(String),

    /// The device was lost
    DeviceLost,

    /// Mesh id unknown to the resource manager
    MeshNotFound(String),

    /// Model file not found or could not be loaded
    ModelNotFound(String),

    /// Resource id or path unknown to the resource manager
    ResourceNotFound(String),

    /// Shader program failed to compile or link
    ShaderCompilationFailed(String),

    /// Invalid resource description (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Operation requires an initialized renderer
    NotInitialized,

    /// Filesystem error while reading an asset
    Io(String),

    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),
}

impl Error {
    /// Get the enumerated code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NoSuitableDevice(_) => ErrorCode::NoSuitableDevice,
            Error::SurfaceCreationFailed(_) => ErrorCode::SurfaceCreationFailed,
            Error::InitializationFailed(_) => ErrorCode::InitializationFailed,
            Error::BackendUnavailable(_) => ErrorCode::BackendUnavailable,
            Error::SurfaceOutOfDate => ErrorCode::SurfaceOutOfDate,
            Error::RecordingFailed(_) => ErrorCode::RecordingFailed,
            Error::SubmitFailed(_) => ErrorCode::SubmitFailed,
            Error::DeviceLost => ErrorCode::DeviceLost,
            Error::MeshNotFound(_) => ErrorCode::MeshNotFound,
            Error::ModelNotFound(_) => ErrorCode::ModelNotFound,
            Error::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            Error::ShaderCompilationFailed(_) => ErrorCode::ShaderCompilationFailed,
            Error::InvalidResource(_) => ErrorCode::InvalidResource,
            Error::OutOfMemory => ErrorCode::OutOfMemory,
            Error::NotInitialized => ErrorCode::NotInitialized,
            Error::Io(_) => ErrorCode::Io,
            Error::BackendError(_) => ErrorCode::BackendError,
        }
    }

    /// Whether this error must terminate the application
    pub fn is_fatal(&self) -> bool {
        self.code().class() == ErrorClass::Fatal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.code().message();
        match self {
            Error::NoSuitableDevice(msg)
            | Error::SurfaceCreationFailed(msg)
            | Error::InitializationFailed(msg)
            | Error::BackendUnavailable(msg)
            | Error::RecordingFailed(msg)
            | Error::SubmitFailed(msg)
            | Error::MeshNotFound(msg)
            | Error::ModelNotFound(msg)
            | Error::ResourceNotFound(msg)
            | Error::ShaderCompilationFailed(msg)
            | Error::InvalidResource(msg)
            | Error::Io(msg)
            | Error::BackendError(msg) => write!(f, "{}: {}", text, msg),
            Error::SurfaceOutOfDate | Error::DeviceLost | Error::OutOfMemory | Error::NotInitialized => {
                write!(f, "{}", text)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

// ===== ERROR CODES =====

/// Small enumerated error code handed to the scene layer
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok = 0,
    NoSuitableDevice = 1,
    SurfaceCreationFailed = 2,
    InitializationFailed = 3,
    BackendUnavailable = 4,
    SurfaceOutOfDate = 5,
    RecordingFailed = 6,
    SubmitFailed = 7,
    DeviceLost = 8,
    MeshNotFound = 9,
    ModelNotFound = 10,
    ResourceNotFound = 11,
    ShaderCompilationFailed = 12,
    InvalidResource = 13,
    OutOfMemory = 14,
    NotInitialized = 15,
    Io = 16,
    BackendError = 17,
}

/// Lookup table indexed by `ErrorCode as usize`
const ERROR_MESSAGES: [&str; 18] = [
    "No error",
    "No suitable rendering device",
    "Surface creation failed",
    "Initialization failed",
    "Backend unavailable",
    "Surface out of date",
    "Command recording failed",
    "Queue submission failed",
    "Device lost",
    "Mesh not found",
    "Model not found",
    "Resource not found",
    "Shader compilation failed",
    "Invalid resource",
    "Out of GPU memory",
    "Renderer not initialized",
    "I/O error",
    "Backend error",
];

/// How an error is handled by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Startup condition that terminates the application
    Fatal,
    /// Recovered locally by rebuilding the surface; frame skipped
    Transient,
    /// Frame dropped, next frame proceeds
    Frame,
    /// Reported to the caller of a resource operation
    Resource,
    /// Not an error
    None,
}

impl ErrorCode {
    /// Human-readable description of this code
    pub fn message(self) -> &'static str {
        ERROR_MESSAGES[self as usize]
    }

    /// Handling class of this code
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorCode::Ok => ErrorClass::None,
            ErrorCode::NoSuitableDevice
            | ErrorCode::SurfaceCreationFailed
            | ErrorCode::InitializationFailed
            | ErrorCode::BackendUnavailable
            | ErrorCode::DeviceLost => ErrorClass::Fatal,
            ErrorCode::SurfaceOutOfDate => ErrorClass::Transient,
            ErrorCode::RecordingFailed
            | ErrorCode::SubmitFailed
            | ErrorCode::NotInitialized
            | ErrorCode::BackendError => ErrorClass::Frame,
            ErrorCode::MeshNotFound
            | ErrorCode::ModelNotFound
            | ErrorCode::ResourceNotFound
            | ErrorCode::ShaderCompilationFailed
            | ErrorCode::InvalidResource
            | ErrorCode::OutOfMemory
            | ErrorCode::Io => ErrorClass::Resource,
        }
    }

    /// Convert a raw code back into an `ErrorCode`
    pub fn from_raw(raw: u8) -> Option<ErrorCode> {
        const ALL: [ErrorCode; 18] = [
            ErrorCode::Ok,
            ErrorCode::NoSuitableDevice,
            ErrorCode::SurfaceCreationFailed,
            ErrorCode::InitializationFailed,
            ErrorCode::BackendUnavailable,
            ErrorCode::SurfaceOutOfDate,
            ErrorCode::RecordingFailed,
            ErrorCode::SubmitFailed,
            ErrorCode::DeviceLost,
            ErrorCode::MeshNotFound,
            ErrorCode::ModelNotFound,
            ErrorCode::ResourceNotFound,
            ErrorCode::ShaderCompilationFailed,
            ErrorCode::InvalidResource,
            ErrorCode::OutOfMemory,
            ErrorCode::NotInitialized,
            ErrorCode::Io,
            ErrorCode::BackendError,
        ];
        ALL.get(raw as usize).copied()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Translate an error code into its human-readable string
pub fn error_message(code: ErrorCode) -> &'static str {
    code.message()
}

// ===== ERROR MACROS =====

/// Log an error and build an `Error::BackendError` from it
///
/// # Example
///
/// ```no_run
/// # use lumen_engine::engine_err;
/// let err = engine_err!("lumen::vulkan", "Failed to create fence: {}", 42);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::lumen::Error::BackendError(message)
    }};
}

/// Log an error and return `Err(Error::BackendError)` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a warning and build an `Error::BackendError` from it
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::lumen::Error::BackendError(message)
    }};
}

/// Log a warning and return `Err(Error::BackendError)` from the current function
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
