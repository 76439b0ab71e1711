//! Unified error surface of the passthrough API.
//!
//! A call can fail through three independent channels at once: the
//! server's `IOError`, the server's `IllegalArgument`, and any client-side
//! fault. [`HbaseError`] keeps every populated channel, in that order,
//! and renders them as one deterministic string.

use crate::error::ClientError;
use hbrpc_protocol::{IllegalArgument, IoError, Reply};
use std::fmt;

/// One populated failure channel.
#[derive(Debug)]
pub enum Fault {
    /// General operational fault declared by the server.
    Io(IoError),
    /// Argument rejected by the server.
    IllegalArgument(IllegalArgument),
    /// Any other fault, including transport and decode failures.
    Other(ClientError),
}

impl Fault {
    fn order(&self) -> u8 {
        match self {
            Fault::Io(_) => 0,
            Fault::IllegalArgument(_) => 1,
            Fault::Other(_) => 2,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Io(e) => write!(f, "IOError:{};", e.message),
            Fault::IllegalArgument(e) => write!(f, "ArgumentError:{};", e.message),
            Fault::Other(e) => write!(f, "Error:{};", e),
        }
    }
}

/// Composite error returned by every passthrough call.
///
/// Never empty; faults are kept in channel order.
#[derive(Debug)]
pub struct HbaseError {
    faults: Vec<Fault>,
}

/// Merges the three failure channels, returning `None` when all are absent.
pub fn unify(
    io: Option<IoError>,
    illegal_argument: Option<IllegalArgument>,
    other: Option<ClientError>,
) -> Option<HbaseError> {
    let faults: Vec<Fault> = [
        io.map(Fault::Io),
        illegal_argument.map(Fault::IllegalArgument),
        other.map(Fault::Other),
    ]
    .into_iter()
    .flatten()
    .collect();

    if faults.is_empty() {
        None
    } else {
        Some(HbaseError { faults })
    }
}

impl HbaseError {
    /// Builds an error from a single fault.
    pub fn new(fault: Fault) -> Self {
        Self {
            faults: vec![fault],
        }
    }

    /// Adds a fault, keeping channel order. A second fault on an occupied
    /// channel is appended after the first.
    pub fn with(mut self, fault: Fault) -> Self {
        let pos = self
            .faults
            .iter()
            .position(|f| f.order() > fault.order())
            .unwrap_or(self.faults.len());
        self.faults.insert(pos, fault);
        self
    }

    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn io(&self) -> Option<&IoError> {
        self.faults.iter().find_map(|f| match f {
            Fault::Io(e) => Some(e),
            _ => None,
        })
    }

    pub fn illegal_argument(&self) -> Option<&IllegalArgument> {
        self.faults.iter().find_map(|f| match f {
            Fault::IllegalArgument(e) => Some(e),
            _ => None,
        })
    }

    pub fn client_error(&self) -> Option<&ClientError> {
        self.faults.iter().find_map(|f| match f {
            Fault::Other(e) => Some(e),
            _ => None,
        })
    }

    /// Returns whether the call was rejected because the connection was closed.
    pub fn is_not_open(&self) -> bool {
        matches!(self.client_error(), Some(ClientError::NotOpen))
    }
}

impl fmt::Display for HbaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fault in &self.faults {
            write!(f, "{}", fault)?;
        }
        Ok(())
    }
}

impl std::error::Error for HbaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.client_error()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<ClientError> for HbaseError {
    fn from(e: ClientError) -> Self {
        Self::new(Fault::Other(e))
    }
}

impl From<hbrpc_protocol::ProtocolError> for HbaseError {
    fn from(e: hbrpc_protocol::ProtocolError) -> Self {
        ClientError::from(e).into()
    }
}

/// Converts a decoded result struct into the passthrough result.
///
/// `AlreadyExists` travels on the generic channel.
pub(crate) fn check_reply<T>(reply: Reply<T>) -> Result<Option<T>, HbaseError> {
    let Reply {
        success,
        io,
        illegal_argument,
        already_exists,
    } = reply;
    match unify(
        io,
        illegal_argument,
        already_exists.map(ClientError::AlreadyExists),
    ) {
        Some(err) => Err(err),
        None => Ok(success),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbrpc_protocol::AlreadyExists;

    #[test]
    fn test_unify_nothing() {
        assert!(unify(None, None, None).is_none());
    }

    #[test]
    fn test_unify_single_channels() {
        let err = unify(Some(IoError::new("f")), None, None).unwrap();
        assert_eq!(err.to_string(), "IOError:f;");
        assert_eq!(err.io().map(|e| e.message.as_str()), Some("f"));
        assert!(err.illegal_argument().is_none());

        let err = unify(None, Some(IllegalArgument::new("bad")), None).unwrap();
        assert_eq!(err.to_string(), "ArgumentError:bad;");

        let err = unify(None, None, Some(ClientError::NotOpen)).unwrap();
        assert_eq!(err.to_string(), "Error:connection not open;");
        assert!(err.is_not_open());
    }

    #[test]
    fn test_unify_all_channels_fixed_order() {
        let err = unify(
            Some(IoError::new("io")),
            Some(IllegalArgument::new("arg")),
            Some(ClientError::Timeout),
        )
        .unwrap();
        assert_eq!(
            err.to_string(),
            "IOError:io;ArgumentError:arg;Error:request timeout;"
        );
        assert_eq!(err.faults().len(), 3);
    }

    #[test]
    fn test_with_keeps_channel_order() {
        let err = HbaseError::from(ClientError::Timeout)
            .with(Fault::Io(IoError::new("io")))
            .with(Fault::IllegalArgument(IllegalArgument::new("arg")));
        assert_eq!(
            err.to_string(),
            "IOError:io;ArgumentError:arg;Error:request timeout;"
        );
    }

    #[test]
    fn test_source_is_client_error() {
        use std::error::Error;

        let err = HbaseError::from(ClientError::ConnectionClosed);
        assert_eq!(err.source().unwrap().to_string(), "connection closed");

        let err = unify(Some(IoError::new("x")), None, None).unwrap();
        assert!(err.source().is_none());
    }

    #[test]
    fn test_check_reply() {
        let ok: Reply<i64> = Reply {
            success: Some(5),
            ..Default::default()
        };
        assert_eq!(check_reply(ok).unwrap(), Some(5));

        let exists: Reply<()> = Reply {
            already_exists: Some(AlreadyExists::new("t1")),
            ..Default::default()
        };
        let err = check_reply(exists).unwrap_err();
        assert_eq!(err.to_string(), "Error:table already exists: t1;");

        let both: Reply<()> = Reply {
            io: Some(IoError::new("io")),
            illegal_argument: Some(IllegalArgument::new("arg")),
            ..Default::default()
        };
        assert_eq!(
            check_reply(both).unwrap_err().to_string(),
            "IOError:io;ArgumentError:arg;"
        );
    }
}
