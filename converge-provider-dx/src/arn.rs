//! ARN construction for Direct Connect resources

use std::fmt;

/// Account-level context needed to name resources
///
/// Passed explicitly to the provider rather than read from the environment at
/// call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl AccountContext {
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    /// Context in the standard `aws` partition
    pub fn aws(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self::new("aws", region, account_id)
    }
}

/// Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    /// ARN of a virtual interface: `arn:<partition>:directconnect:<region>:<account>:dxvif/<id>`
    pub fn virtual_interface(account: &AccountContext, id: &str) -> Self {
        Self {
            partition: account.partition.clone(),
            service: "directconnect".to_string(),
            region: account.region.clone(),
            account_id: account.account_id.clone(),
            resource: format!("dxvif/{}", id),
        }
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}
