//! Virtual interface lifecycle states and per-kind wait targets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// State of a Direct Connect virtual interface as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtualInterfaceState {
    Confirming,
    Verifying,
    Pending,
    Available,
    Down,
    Deleting,
    Deleted,
    Rejected,
    /// BGP failover test in progress
    Testing,
    Unknown,
}

impl VirtualInterfaceState {
    pub const ALL: [VirtualInterfaceState; 10] = [
        VirtualInterfaceState::Confirming,
        VirtualInterfaceState::Verifying,
        VirtualInterfaceState::Pending,
        VirtualInterfaceState::Available,
        VirtualInterfaceState::Down,
        VirtualInterfaceState::Deleting,
        VirtualInterfaceState::Deleted,
        VirtualInterfaceState::Rejected,
        VirtualInterfaceState::Testing,
        VirtualInterfaceState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VirtualInterfaceState::Confirming => "confirming",
            VirtualInterfaceState::Verifying => "verifying",
            VirtualInterfaceState::Pending => "pending",
            VirtualInterfaceState::Available => "available",
            VirtualInterfaceState::Down => "down",
            VirtualInterfaceState::Deleting => "deleting",
            VirtualInterfaceState::Deleted => "deleted",
            VirtualInterfaceState::Rejected => "rejected",
            VirtualInterfaceState::Testing => "testing",
            VirtualInterfaceState::Unknown => "unknown",
        }
    }

    /// The interface is gone, or on its way out, and should be dropped from
    /// the caller's records
    pub fn is_gone(&self) -> bool {
        match self {
            VirtualInterfaceState::Deleting
            | VirtualInterfaceState::Deleted
            | VirtualInterfaceState::Rejected => true,
            VirtualInterfaceState::Confirming
            | VirtualInterfaceState::Verifying
            | VirtualInterfaceState::Pending
            | VirtualInterfaceState::Available
            | VirtualInterfaceState::Down
            | VirtualInterfaceState::Testing
            | VirtualInterfaceState::Unknown => false,
        }
    }

    /// States a deleted interface may pass through before reaching `deleted`
    pub fn delete_pending() -> Vec<VirtualInterfaceState> {
        vec![
            VirtualInterfaceState::Available,
            VirtualInterfaceState::Confirming,
            VirtualInterfaceState::Deleting,
            VirtualInterfaceState::Down,
            VirtualInterfaceState::Pending,
            VirtualInterfaceState::Rejected,
            VirtualInterfaceState::Verifying,
        ]
    }
}

impl fmt::Display for VirtualInterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a state string outside the known enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown virtual interface state '{0}'")]
pub struct UnknownStateError(pub String);

impl FromStr for VirtualInterfaceState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VirtualInterfaceState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownStateError(s.to_string()))
    }
}

/// Flavour of virtual interface, which decides what "created" means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualInterfaceKind {
    Public,
    Private,
    HostedPublic,
    HostedPrivate,
    HostedPublicAccepter,
    HostedPrivateAccepter,
}

impl VirtualInterfaceKind {
    pub const ALL: [VirtualInterfaceKind; 6] = [
        VirtualInterfaceKind::Public,
        VirtualInterfaceKind::Private,
        VirtualInterfaceKind::HostedPublic,
        VirtualInterfaceKind::HostedPrivate,
        VirtualInterfaceKind::HostedPublicAccepter,
        VirtualInterfaceKind::HostedPrivateAccepter,
    ];

    /// Resource type name (e.g., "dx_private_virtual_interface")
    pub fn resource_type(&self) -> &'static str {
        match self {
            VirtualInterfaceKind::Public => "dx_public_virtual_interface",
            VirtualInterfaceKind::Private => "dx_private_virtual_interface",
            VirtualInterfaceKind::HostedPublic => "dx_hosted_public_virtual_interface",
            VirtualInterfaceKind::HostedPrivate => "dx_hosted_private_virtual_interface",
            VirtualInterfaceKind::HostedPublicAccepter => {
                "dx_hosted_public_virtual_interface_accepter"
            }
            VirtualInterfaceKind::HostedPrivateAccepter => {
                "dx_hosted_private_virtual_interface_accepter"
            }
        }
    }

    pub fn is_public(&self) -> bool {
        match self {
            VirtualInterfaceKind::Public
            | VirtualInterfaceKind::HostedPublic
            | VirtualInterfaceKind::HostedPublicAccepter => true,
            VirtualInterfaceKind::Private
            | VirtualInterfaceKind::HostedPrivate
            | VirtualInterfaceKind::HostedPrivateAccepter => false,
        }
    }

    /// Pending and target states while waiting for a new interface to come up
    pub fn available_states(
        &self,
    ) -> (Vec<VirtualInterfaceState>, Vec<VirtualInterfaceState>) {
        use VirtualInterfaceState::*;

        match self {
            VirtualInterfaceKind::Public => (vec![Pending], vec![Available, Down, Verifying]),
            VirtualInterfaceKind::Private => (vec![Pending], vec![Available, Down]),
            VirtualInterfaceKind::HostedPublic => {
                (vec![Pending], vec![Available, Confirming, Down, Verifying])
            }
            VirtualInterfaceKind::HostedPrivate => {
                (vec![Pending], vec![Available, Confirming, Down])
            }
            VirtualInterfaceKind::HostedPublicAccepter => {
                (vec![Confirming, Pending, Verifying], vec![Available, Down])
            }
            VirtualInterfaceKind::HostedPrivateAccepter => {
                (vec![Confirming, Pending], vec![Available, Down])
            }
        }
    }
}

impl fmt::Display for VirtualInterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_type())
    }
}

impl FromStr for VirtualInterfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(VirtualInterfaceKind::Public),
            "private" => Ok(VirtualInterfaceKind::Private),
            "hosted_public" => Ok(VirtualInterfaceKind::HostedPublic),
            "hosted_private" => Ok(VirtualInterfaceKind::HostedPrivate),
            "hosted_public_accepter" => Ok(VirtualInterfaceKind::HostedPublicAccepter),
            "hosted_private_accepter" => Ok(VirtualInterfaceKind::HostedPrivateAccepter),
            other => Err(format!(
                "Unknown virtual interface kind '{}', expected one of: public, private, \
                 hosted_public, hosted_private, hosted_public_accepter, hosted_private_accepter",
                other
            )),
        }
    }
}
