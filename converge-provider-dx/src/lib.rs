//! Converge Direct Connect Provider
//!
//! Lifecycle operations for AWS Direct Connect virtual interfaces: reading an
//! interface into resource attributes, updating its tags, deleting it and
//! waiting for it to come up or go away.

pub mod arn;
pub mod attributes;
pub mod aws;
pub mod client;
pub mod schema;
pub mod state;
pub mod tags;

use std::time::Duration;

use converge_core::provider::{ProviderError, ProviderResult};
use converge_core::resource::{Resource, ResourceId, State};
use converge_core::timeouts::ResourceTimeouts;
use converge_core::waiter::{PollError, PollSpec, RefreshResult, StatePoller};

use crate::arn::{AccountContext, Arn};
use crate::attributes::virtual_interface_attributes;
use crate::client::{DirectConnectApi, VirtualInterface};
use crate::state::{VirtualInterfaceKind, VirtualInterfaceState};
use crate::tags::{diff_tags, tags_from_attributes};

/// Wait before the first refresh after a mutating call
pub const REFRESH_DELAY: Duration = Duration::from_secs(10);

/// Minimum interval between refreshes
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Query the current state of a virtual interface
///
/// An interface the API no longer knows about, whether reported as an error
/// or as an empty result, is `deleted` with no object.
pub async fn refresh_virtual_interface<C>(
    client: &C,
    id: &str,
) -> ProviderResult<RefreshResult<VirtualInterface, VirtualInterfaceState>>
where
    C: DirectConnectApi + ?Sized,
{
    let interfaces = match client.describe_virtual_interfaces(id).await {
        Ok(interfaces) => interfaces,
        Err(e) if e.is_not_found() => {
            return Ok(RefreshResult::absent(VirtualInterfaceState::Deleted));
        }
        Err(e) => {
            return Err(
                ProviderError::new(format!("Error describing virtual interface {}: {}", id, e))
                    .with_cause(e),
            );
        }
    };

    match interfaces.into_iter().next() {
        Some(vif) => {
            let state = vif.state;
            Ok(RefreshResult::found(vif, state))
        }
        None => Ok(RefreshResult::absent(VirtualInterfaceState::Deleted)),
    }
}

/// Turn a failed wait into a provider error
///
/// Refresh failures already carry their own message and pass through as is.
fn wait_error(err: PollError, context: String) -> ProviderError {
    match err {
        PollError::Refresh(inner) => inner,
        other => ProviderError::new(format!("{}: {}", context, other)).with_cause(other),
    }
}

/// Direct Connect virtual interface provider
pub struct DxProvider<C> {
    client: C,
    account: AccountContext,
    timeouts: ResourceTimeouts,
}

impl<C: DirectConnectApi> DxProvider<C> {
    pub fn new(client: C, account: AccountContext) -> Self {
        Self {
            client,
            account,
            timeouts: ResourceTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ResourceTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn timeouts(&self) -> &ResourceTimeouts {
        &self.timeouts
    }

    fn arn(&self, identifier: &str) -> String {
        Arn::virtual_interface(&self.account, identifier).to_string()
    }

    /// Read an interface into resource attributes
    ///
    /// Interfaces that are deleting, deleted or rejected read as not found so
    /// the caller stops tracking them.
    pub async fn read(
        &self,
        kind: VirtualInterfaceKind,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let refreshed = refresh_virtual_interface(&self.client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let vif = match refreshed.object {
            Some(vif) if !refreshed.state.is_gone() => vif,
            _ => {
                log::warn!(
                    "Direct Connect virtual interface ({}) is {}, treating as not found",
                    identifier,
                    refreshed.state
                );
                return Ok(State::not_found(id.clone()));
            }
        };

        let tags = self
            .client
            .describe_tags(&self.arn(identifier))
            .await
            .map_err(|e| {
                ProviderError::new(format!("Error reading tags: {}", e))
                    .for_resource(id.clone())
                    .with_cause(e)
            })?;

        let attributes = virtual_interface_attributes(&self.account, kind, &vif, &tags);
        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    /// Bring the interface's tags in line with the desired resource
    ///
    /// Tags are the only attribute that can change without replacement.
    pub async fn update(&self, identifier: &str, from: &State, to: &Resource) -> ProviderResult<()> {
        let diff = diff_tags(
            &tags_from_attributes(&from.attributes),
            &tags_from_attributes(&to.attributes),
        );
        if diff.is_empty() {
            return Ok(());
        }

        let arn = self.arn(identifier);
        if !diff.remove.is_empty() {
            log::debug!("Removing tags {:?} from {}", diff.remove, arn);
            self.client
                .untag_resource(&arn, &diff.remove)
                .await
                .map_err(|e| {
                    ProviderError::new(format!("Error removing tags: {}", e))
                        .for_resource(to.id.clone())
                        .with_cause(e)
                })?;
        }
        if !diff.create.is_empty() {
            log::debug!("Adding {} tags to {}", diff.create.len(), arn);
            self.client
                .tag_resource(&arn, &diff.create)
                .await
                .map_err(|e| {
                    ProviderError::new(format!("Error adding tags: {}", e))
                        .for_resource(to.id.clone())
                        .with_cause(e)
                })?;
        }
        Ok(())
    }

    /// Delete an interface and wait until it is gone
    ///
    /// Deleting an interface that no longer exists succeeds.
    pub async fn delete(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        log::debug!("Deleting Direct Connect virtual interface: {}", identifier);
        match self.client.delete_virtual_interface(identifier).await {
            Ok(state) => log::debug!("Virtual interface {} is now {}", identifier, state),
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Error deleting Direct Connect virtual interface: {}",
                    e
                ))
                .for_resource(id.clone())
                .with_cause(e));
            }
        }

        let spec = PollSpec::new(
            VirtualInterfaceState::delete_pending(),
            vec![VirtualInterfaceState::Deleted],
            self.timeouts.delete,
        )
        .with_delay(REFRESH_DELAY)
        .with_min_interval(MIN_REFRESH_INTERVAL);

        StatePoller::new(spec)
            .poll(|| refresh_virtual_interface(&self.client, identifier))
            .await
            .map_err(|e| {
                wait_error(
                    e,
                    format!(
                        "Error waiting for Direct Connect virtual interface ({}) to be deleted",
                        identifier
                    ),
                )
                .for_resource(id.clone())
            })?;
        Ok(())
    }

    /// Wait for a newly created interface to become usable
    pub async fn wait_until_available(
        &self,
        kind: VirtualInterfaceKind,
        identifier: &str,
    ) -> ProviderResult<VirtualInterface> {
        let (pending, target) = kind.available_states();
        let spec = PollSpec::new(pending, target, self.timeouts.create)
            .with_delay(REFRESH_DELAY)
            .with_min_interval(MIN_REFRESH_INTERVAL);

        let vif = StatePoller::new(spec)
            .poll(|| refresh_virtual_interface(&self.client, identifier))
            .await
            .map_err(|e| {
                wait_error(
                    e,
                    format!(
                        "Error waiting for Direct Connect virtual interface {} to become available",
                        identifier
                    ),
                )
            })?;

        vif.ok_or_else(|| {
            ProviderError::new(format!(
                "Direct Connect virtual interface {} disappeared while waiting",
                identifier
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use converge_core::resource::Value;

    use super::*;
    use crate::client::{AddressFamily, ApiError, ApiResult, CLIENT_EXCEPTION};
    use crate::tags::tags_to_value;

    type Describe = ApiResult<Vec<VirtualInterface>>;

    /// In-memory Direct Connect double replaying scripted describe results
    #[derive(Default)]
    struct FakeDirectConnect {
        describes: Mutex<VecDeque<Describe>>,
        delete_result: Mutex<Option<ApiResult<VirtualInterfaceState>>>,
        tags: Mutex<HashMap<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDirectConnect {
        fn with_describes(describes: Vec<Describe>) -> Self {
            Self {
                describes: Mutex::new(describes.into()),
                ..Self::default()
            }
        }

        fn with_delete_result(self, result: ApiResult<VirtualInterfaceState>) -> Self {
            *self.delete_result.lock().unwrap() = Some(result);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl DirectConnectApi for FakeDirectConnect {
        async fn describe_virtual_interfaces(&self, id: &str) -> Describe {
            self.record(format!("describe {}", id));
            self.describes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![]))
        }

        async fn delete_virtual_interface(&self, id: &str) -> ApiResult<VirtualInterfaceState> {
            self.record(format!("delete {}", id));
            self.delete_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(VirtualInterfaceState::Deleting))
        }

        async fn describe_tags(&self, _arn: &str) -> ApiResult<HashMap<String, String>> {
            Ok(self.tags.lock().unwrap().clone())
        }

        async fn tag_resource(&self, arn: &str, tags: &HashMap<String, String>) -> ApiResult<()> {
            let mut keys: Vec<&String> = tags.keys().collect();
            keys.sort();
            self.record(format!("tag {} {:?}", arn, keys));
            self.tags
                .lock()
                .unwrap()
                .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        }

        async fn untag_resource(&self, arn: &str, keys: &[String]) -> ApiResult<()> {
            self.record(format!("untag {} {:?}", arn, keys));
            let mut tags = self.tags.lock().unwrap();
            for key in keys {
                tags.remove(key);
            }
            Ok(())
        }
    }

    fn vif(state: VirtualInterfaceState) -> VirtualInterface {
        VirtualInterface {
            id: "dxvif-1".to_string(),
            name: "edge".to_string(),
            connection_id: "dxcon-1".to_string(),
            vlan: 100,
            asn: 65000,
            auth_key: None,
            address_family: Some(AddressFamily::Ipv4),
            customer_address: None,
            amazon_address: None,
            state,
            route_filter_prefixes: vec![],
        }
    }

    fn not_found() -> ApiError {
        ApiError::new(
            CLIENT_EXCEPTION,
            "Virtual interface dxvif-1 does not exist",
        )
    }

    fn provider(fake: FakeDirectConnect) -> DxProvider<FakeDirectConnect> {
        DxProvider::new(fake, AccountContext::aws("us-east-1", "123456789012"))
    }

    fn resource_id() -> ResourceId {
        ResourceId::new("dx_private_virtual_interface", "edge")
    }

    #[tokio::test]
    async fn refresh_maps_not_found_error_to_deleted() {
        let fake = FakeDirectConnect::with_describes(vec![Err(not_found())]);
        let result = refresh_virtual_interface(&fake, "dxvif-1").await.unwrap();
        assert_eq!(result, RefreshResult::absent(VirtualInterfaceState::Deleted));
    }

    #[tokio::test]
    async fn refresh_maps_empty_result_to_deleted() {
        let fake = FakeDirectConnect::with_describes(vec![Ok(vec![])]);
        let result = refresh_virtual_interface(&fake, "dxvif-1").await.unwrap();
        assert_eq!(result.state, VirtualInterfaceState::Deleted);
        assert!(result.object.is_none());
    }

    #[tokio::test]
    async fn refresh_propagates_other_errors() {
        let fake = FakeDirectConnect::with_describes(vec![Err(ApiError::new(
            "DirectConnectServerException",
            "internal failure",
        ))]);
        let err = refresh_virtual_interface(&fake, "dxvif-1").await.unwrap_err();
        assert!(err.message.contains("internal failure"));
        assert!(err.cause_as::<ApiError>().is_some());
    }

    #[tokio::test]
    async fn read_existing_interface() {
        let fake = FakeDirectConnect::with_describes(vec![Ok(vec![vif(
            VirtualInterfaceState::Available,
        )])]);
        fake.tags
            .lock()
            .unwrap()
            .insert("env".to_string(), "prod".to_string());
        let provider = provider(fake);

        let state = provider
            .read(VirtualInterfaceKind::Private, &resource_id(), "dxvif-1")
            .await
            .unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("dxvif-1"));
        assert_eq!(state.attributes.get("vlan"), Some(&Value::Int(100)));
        let mut expected_tags = HashMap::new();
        expected_tags.insert("env".to_string(), "prod".to_string());
        assert_eq!(state.attributes.get("tags"), Some(&tags_to_value(&expected_tags)));
    }

    #[tokio::test]
    async fn read_treats_gone_states_as_not_found() {
        for gone in [
            VirtualInterfaceState::Deleting,
            VirtualInterfaceState::Deleted,
            VirtualInterfaceState::Rejected,
        ] {
            let provider = provider(FakeDirectConnect::with_describes(vec![Ok(vec![vif(gone)])]));
            let state = provider
                .read(VirtualInterfaceKind::Private, &resource_id(), "dxvif-1")
                .await
                .unwrap();
            assert!(!state.exists, "{} should read as not found", gone);
        }
    }

    #[tokio::test]
    async fn read_error_names_the_resource() {
        let provider = provider(FakeDirectConnect::with_describes(vec![Err(ApiError::new(
            "ThrottlingException",
            "Rate exceeded",
        ))]));
        let err = provider
            .read(VirtualInterfaceKind::Private, &resource_id(), "dxvif-1")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("[dx_private_virtual_interface.edge]"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_deleted() {
        let fake = FakeDirectConnect::with_describes(vec![
            Ok(vec![vif(VirtualInterfaceState::Deleting)]),
            Ok(vec![vif(VirtualInterfaceState::Deleting)]),
            Ok(vec![vif(VirtualInterfaceState::Deleted)]),
        ]);
        let provider = provider(fake);

        provider.delete(&resource_id(), "dxvif-1").await.unwrap();

        assert_eq!(
            provider.client().calls(),
            vec![
                "delete dxvif-1",
                "describe dxvif-1",
                "describe dxvif-1",
                "describe dxvif-1"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_missing_interface_is_idempotent() {
        let fake = FakeDirectConnect::default().with_delete_result(Err(not_found()));
        let provider = provider(fake);

        provider.delete(&resource_id(), "dxvif-1").await.unwrap();

        assert_eq!(provider.client().calls(), vec!["delete dxvif-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_succeeds_when_interface_vanishes() {
        let fake = FakeDirectConnect::with_describes(vec![
            Ok(vec![vif(VirtualInterfaceState::Deleting)]),
            Err(not_found()),
        ]);
        provider(fake).delete(&resource_id(), "dxvif-1").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn delete_times_out_when_stuck() {
        let describes = (0..200)
            .map(|_| Ok(vec![vif(VirtualInterfaceState::Deleting)]))
            .collect();
        let provider = provider(FakeDirectConnect::with_describes(describes))
            .with_timeouts(ResourceTimeouts::default().with_delete(Duration::from_secs(60)));

        let err = provider.delete(&resource_id(), "dxvif-1").await.unwrap_err();

        assert!(err.message.contains("to be deleted"));
        assert_eq!(err.resource_id, Some(resource_id()));
        assert!(err.cause_as::<PollError>().is_some_and(|e| e.is_timeout()));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_api_failure_is_reported() {
        let fake = FakeDirectConnect::default()
            .with_delete_result(Err(ApiError::new(CLIENT_EXCEPTION, "Rate exceeded")));
        let err = provider(fake).delete(&resource_id(), "dxvif-1").await.unwrap_err();
        assert!(err.message.starts_with("Error deleting Direct Connect virtual interface"));
        assert_eq!(err.resource_id, Some(resource_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_refresh_failure_keeps_its_message() {
        let fake = FakeDirectConnect::with_describes(vec![Err(ApiError::new(
            "DirectConnectServerException",
            "internal failure",
        ))]);
        let err = provider(fake).delete(&resource_id(), "dxvif-1").await.unwrap_err();

        assert!(err.message.contains("internal failure"));
        assert!(err.cause_as::<ApiError>().is_some());
        assert!(err.to_string().starts_with("[dx_private_virtual_interface.edge]"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_available_fails_while_testing() {
        let fake = FakeDirectConnect::with_describes(vec![
            Ok(vec![vif(VirtualInterfaceState::Pending)]),
            Ok(vec![vif(VirtualInterfaceState::Testing)]),
        ]);
        let err = provider(fake)
            .wait_until_available(VirtualInterfaceKind::Private, "dxvif-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err.cause_as::<PollError>(),
            Some(PollError::UnexpectedState { state, .. }) if state == "testing"
        ));
    }

    #[tokio::test]
    async fn read_interface_under_failover_test() {
        let provider = provider(FakeDirectConnect::with_describes(vec![Ok(vec![vif(
            VirtualInterfaceState::Testing,
        )])]));
        let state = provider
            .read(VirtualInterfaceKind::Private, &resource_id(), "dxvif-1")
            .await
            .unwrap();
        assert!(state.exists);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_available_returns_interface() {
        let fake = FakeDirectConnect::with_describes(vec![
            Ok(vec![vif(VirtualInterfaceState::Pending)]),
            Ok(vec![vif(VirtualInterfaceState::Down)]),
        ]);
        let vif = provider(fake)
            .wait_until_available(VirtualInterfaceKind::Private, "dxvif-1")
            .await
            .unwrap();
        assert_eq!(vif.state, VirtualInterfaceState::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_available_rejects_unexpected_state() {
        let fake = FakeDirectConnect::with_describes(vec![
            Ok(vec![vif(VirtualInterfaceState::Pending)]),
            Ok(vec![vif(VirtualInterfaceState::Rejected)]),
        ]);
        let err = provider(fake)
            .wait_until_available(VirtualInterfaceKind::Private, "dxvif-1")
            .await
            .unwrap_err();
        assert!(err.message.contains("unexpected state 'rejected'"));
    }

    #[tokio::test]
    async fn update_reconciles_tags() {
        let fake = FakeDirectConnect::default();
        let provider = provider(fake);

        let mut old_tags = HashMap::new();
        old_tags.insert("env".to_string(), "dev".to_string());
        old_tags.insert("team".to_string(), "net".to_string());
        let mut from_attrs = HashMap::new();
        from_attrs.insert("tags".to_string(), tags_to_value(&old_tags));
        let from = State::existing(resource_id(), from_attrs);

        let mut new_tags = HashMap::new();
        new_tags.insert("env".to_string(), "prod".to_string());
        let to = Resource::new("dx_private_virtual_interface", "edge")
            .with_attribute("tags", tags_to_value(&new_tags));

        provider.update("dxvif-1", &from, &to).await.unwrap();

        let arn = "arn:aws:directconnect:us-east-1:123456789012:dxvif/dxvif-1";
        assert_eq!(
            provider.client().calls(),
            vec![
                format!("untag {} [\"env\", \"team\"]", arn),
                format!("tag {} [\"env\"]", arn),
            ]
        );
    }

    #[tokio::test]
    async fn update_without_tag_changes_makes_no_calls() {
        let provider = provider(FakeDirectConnect::default());
        let from = State::existing(resource_id(), HashMap::new());
        let to = Resource::new("dx_private_virtual_interface", "edge");

        provider.update("dxvif-1", &from, &to).await.unwrap();

        assert!(provider.client().calls().is_empty());
    }
}
