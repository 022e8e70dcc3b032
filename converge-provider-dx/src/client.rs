//! Direct Connect client abstraction
//!
//! The provider talks to Direct Connect only through [`DirectConnectApi`], so
//! the SDK-backed client and in-memory test doubles are interchangeable.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::VirtualInterfaceState;

/// Error code Direct Connect uses for client-side failures, including lookups
/// of unknown interfaces
pub const CLIENT_EXCEPTION: &str = "DirectConnectClientException";

/// Error returned by a Direct Connect call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The call referenced an interface that does not exist
    pub fn is_not_found(&self) -> bool {
        self.code == CLIENT_EXCEPTION && self.message.contains("does not exist")
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Address family of the BGP peering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ipv4" => Some(AddressFamily::Ipv4),
            "ipv6" => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A virtual interface as described by Direct Connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualInterface {
    pub id: String,
    pub name: String,
    pub connection_id: String,
    pub vlan: i64,
    pub asn: i64,
    pub auth_key: Option<String>,
    pub address_family: Option<AddressFamily>,
    pub customer_address: Option<String>,
    pub amazon_address: Option<String>,
    pub state: VirtualInterfaceState,
    #[serde(default)]
    pub route_filter_prefixes: Vec<RouteFilterPrefix>,
}

/// An IPv4 or IPv6 prefix advertised over a public virtual interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteFilterPrefix {
    pub cidr: String,
}

/// Operations the provider needs from Direct Connect
#[async_trait]
pub trait DirectConnectApi: Send + Sync {
    /// Describe the interface with the given ID
    ///
    /// Unknown IDs either fail with a not-found [`ApiError`] or return an
    /// empty list; callers treat both as deleted.
    async fn describe_virtual_interfaces(&self, id: &str) -> ApiResult<Vec<VirtualInterface>>;

    /// Request deletion; returns the state the interface moved to
    async fn delete_virtual_interface(&self, id: &str) -> ApiResult<VirtualInterfaceState>;

    async fn describe_tags(&self, arn: &str) -> ApiResult<HashMap<String, String>>;

    async fn tag_resource(&self, arn: &str, tags: &HashMap<String, String>) -> ApiResult<()>;

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> ApiResult<()>;
}
