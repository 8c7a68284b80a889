//! The outbound side of the slave: where scheduled paging calls go.
//!
//! Keying the transmitter is hardware-specific and lives outside this crate.
//! [`TransmissionSink`] is the seam; [`LoggingTransmitter`] is the default
//! implementation used when no radio backend is attached.

use pager_core::PagingMessage;
use thiserror::Error;
use tracing::info;

/// Failure to hand a message to the radio path.
#[derive(Debug, Error)]
pub enum TransmitError {
    /// The backend refused or could not accept the message.
    #[error("transmitter rejected message from {source_ip}: {reason}")]
    Rejected {
        source_ip: std::net::IpAddr,
        reason: String,
    },
}

/// Destination for messages drained from the queue by the scheduler.
#[cfg_attr(test, mockall::automock)]
pub trait TransmissionSink: Send + Sync {
    /// Sends one paging call.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] if the message could not be sent.  The
    /// scheduler logs the error and moves on to the next message.
    fn transmit(&self, message: &PagingMessage) -> Result<(), TransmitError>;
}

/// Transmission sink that only logs what it would have sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTransmitter;

impl TransmissionSink for LoggingTransmitter {
    fn transmit(&self, message: &PagingMessage) -> Result<(), TransmitError> {
        info!("transmit from {}: {}", message.source, message.payload);
        Ok(())
    }
}
