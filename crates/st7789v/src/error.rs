//! Driver error type.

/// Errors returned by the ST7789V driver.
///
/// Nothing is retried internally; the caller decides whether to try again
/// (typically after [`St7789v::wait_idle`](crate::St7789v::wait_idle) for
/// [`Error::Busy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The controller was never identified, or the driver was deinitialised.
    #[error("display not attached")]
    NotAttached,
    /// A transfer is in flight or a reset/sleep settle window is open.
    #[error("display is busy")]
    Busy,
    /// An address, window or area violates the controller's numeric limits.
    #[error("parameter out of range")]
    OutOfRange,
    /// No DMA channel could be claimed during initialisation.
    #[error("no DMA channel available")]
    ResourceUnavailable,
    /// Operation is meaningless under the current display configuration.
    #[error("operation unavailable in current configuration")]
    Unavailable,
    /// The serial bus or DMA channel reported an error.
    #[error("bus communication error")]
    Communication,
    /// Chip-select or data/command line failed to switch.
    #[error("GPIO error")]
    Gpio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(Error::NotAttached.to_string(), "display not attached");
        assert_eq!(Error::Busy.to_string(), "display is busy");
        assert_eq!(Error::OutOfRange.to_string(), "parameter out of range");
        assert_eq!(
            Error::ResourceUnavailable.to_string(),
            "no DMA channel available"
        );
        assert_eq!(Error::Gpio.to_string(), "GPIO error");
    }
}
