//! Error types for ESC/P2 raster jobs.
//!
//! The band scheduler and the packbits codec cannot fail on their own; every
//! error here comes either from the output sink, the USB transport, or a job
//! configuration that cannot describe a real print head.

use thiserror::Error;

/// Main error type for raster job operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Writing print data to the output sink failed.
    ///
    /// This is fatal to the job; the page in flight is abandoned.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for device communication issues,
    /// timeouts, or permission problems.
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    /// Printer device is not connected or not responding.
    #[error("Device is offline")]
    DeviceOffline,

    #[error("Can't read device list, permission issue ?")]
    DeviceListNotReadable,

    #[error("Device is missing endpoint")]
    MissingEndpoint,

    /// The printer accepted fewer bytes than were sent.
    #[error("Short write to printer: {0} bytes accepted")]
    InvalidResponse(usize),

    /// Invalid configuration parameter provided.
    ///
    /// Raised for plane counts, bit depths or resolutions no ESC/P2 head
    /// supports. Degenerate weave parameters are clamped instead.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    /// A scanline handed to the page driver does not match the page geometry.
    #[error("Scanline plane {plane} is {actual} bytes, expected at least {expected}")]
    ShortScanline {
        plane: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Scanline has {actual} planes, page expects {expected}")]
    PlaneMismatch { expected: usize, actual: usize },
}
