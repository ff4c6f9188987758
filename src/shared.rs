use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Business relationship of a neighbor relative to a given AS, doubling as
/// the learned-from class of a route (the sender's role as seen by the
/// receiver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Relationships {
    Providers = 1,
    Peers = 2,
    Customers = 3,
}

impl Relationships {
    /// The same edge viewed from the other endpoint.
    pub fn invert(&self) -> Self {
        match self {
            Relationships::Providers => Relationships::Customers,
            Relationships::Customers => Relationships::Providers,
            Relationships::Peers => Relationships::Peers,
        }
    }

    /// Gao-Rexford preference of a route learned over this relationship:
    /// customer routes beat peer routes beat provider routes.
    pub fn gao_rexford_preference(&self) -> u8 {
        match self {
            Relationships::Customers => 2,
            Relationships::Peers => 1,
            Relationships::Providers => 0,
        }
    }
}

impl fmt::Display for Relationships {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relationships::Providers => "PROVIDERS",
            Relationships::Peers => "PEERS",
            Relationships::Customers => "CUSTOMERS",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: invalid announcement row: {row}", .path.display())]
    BadAnnouncement { path: PathBuf, row: String },

    #[error("customer-provider cycle detected in AS relationships")]
    CustomerProviderCycle,

    #[error("propagation did not converge after {iterations} iterations - possible routing cycle")]
    NoConvergence { iterations: u32 },
}

impl SimError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        SimError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
