//! Direct Connect client backed by the AWS SDK

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_directconnect::Client as DirectConnectClient;
use aws_sdk_directconnect::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_directconnect::types::{self as sdk, Tag};

use crate::attributes::expand_route_filter_prefixes;
use crate::client::{AddressFamily, ApiError, ApiResult, DirectConnectApi, VirtualInterface};
use crate::state::VirtualInterfaceState;

/// Direct Connect API client for one region
pub struct AwsDirectConnect {
    client: DirectConnectClient,
    region: String,
}

impl AwsDirectConnect {
    /// Create a client for the specified region using the default credential chain
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: DirectConnectClient::new(&config),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Map an SDK failure to an [`ApiError`], keeping the service error code
fn api_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    metadata_error(&err, || format!("{:?}", err))
}

fn metadata_error(
    meta: &impl ProvideErrorMetadata,
    fallback: impl FnOnce() -> String,
) -> ApiError {
    let code = meta.code().unwrap_or("Unknown").to_string();
    let message = match meta.message() {
        Some(message) => message.to_string(),
        None => fallback(),
    };
    ApiError::new(code, message)
}

fn convert_state(state: Option<&sdk::VirtualInterfaceState>) -> ApiResult<VirtualInterfaceState> {
    let raw = state.map(|s| s.as_str()).unwrap_or("unknown");
    raw.parse()
        .map_err(|e: crate::state::UnknownStateError| ApiError::new("InvalidResponse", e.to_string()))
}

fn convert_virtual_interface(vif: &sdk::VirtualInterface) -> ApiResult<VirtualInterface> {
    let cidrs: Vec<String> = vif
        .route_filter_prefixes()
        .iter()
        .filter_map(|p| p.cidr())
        .map(str::to_string)
        .collect();
    let address_family = vif
        .address_family()
        .and_then(|f| AddressFamily::parse(f.as_str()));

    Ok(VirtualInterface {
        id: vif.virtual_interface_id().unwrap_or_default().to_string(),
        name: vif.virtual_interface_name().unwrap_or_default().to_string(),
        connection_id: vif.connection_id().unwrap_or_default().to_string(),
        vlan: i64::from(vif.vlan()),
        asn: i64::from(vif.asn()),
        auth_key: vif.auth_key().map(str::to_string),
        address_family,
        customer_address: vif.customer_address().map(str::to_string),
        amazon_address: vif.amazon_address().map(str::to_string),
        state: convert_state(vif.virtual_interface_state())?,
        route_filter_prefixes: expand_route_filter_prefixes(&cidrs),
    })
}

#[async_trait]
impl DirectConnectApi for AwsDirectConnect {
    async fn describe_virtual_interfaces(&self, id: &str) -> ApiResult<Vec<VirtualInterface>> {
        let output = self
            .client
            .describe_virtual_interfaces()
            .virtual_interface_id(id)
            .send()
            .await
            .map_err(api_error)?;

        output
            .virtual_interfaces()
            .iter()
            .map(convert_virtual_interface)
            .collect()
    }

    async fn delete_virtual_interface(&self, id: &str) -> ApiResult<VirtualInterfaceState> {
        let output = self
            .client
            .delete_virtual_interface()
            .virtual_interface_id(id)
            .send()
            .await
            .map_err(api_error)?;

        convert_state(output.virtual_interface_state())
    }

    async fn describe_tags(&self, arn: &str) -> ApiResult<HashMap<String, String>> {
        let output = self
            .client
            .describe_tags()
            .resource_arns(arn)
            .send()
            .await
            .map_err(api_error)?;

        Ok(output
            .resource_tags()
            .iter()
            .flat_map(|resource| resource.tags())
            .map(|tag| {
                (
                    tag.key().to_string(),
                    tag.value().unwrap_or_default().to_string(),
                )
            })
            .collect())
    }

    async fn tag_resource(&self, arn: &str, tags: &HashMap<String, String>) -> ApiResult<()> {
        let tags = tags
            .iter()
            .map(|(k, v)| {
                Tag::builder()
                    .key(k)
                    .value(v)
                    .build()
                    .map_err(|e| ApiError::new("InvalidTag", e.to_string()))
            })
            .collect::<ApiResult<Vec<_>>>()?;

        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> ApiResult<()> {
        self.client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}
