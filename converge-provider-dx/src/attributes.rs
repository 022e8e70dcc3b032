//! Flattening virtual interfaces into resource attributes

use std::collections::{BTreeSet, HashMap};

use converge_core::resource::Value;

use crate::arn::{AccountContext, Arn};
use crate::client::{RouteFilterPrefix, VirtualInterface};
use crate::state::VirtualInterfaceKind;
use crate::tags::tags_to_value;

/// Turn CIDR strings into route filter prefixes
pub fn expand_route_filter_prefixes(cidrs: &[String]) -> Vec<RouteFilterPrefix> {
    cidrs
        .iter()
        .map(|cidr| RouteFilterPrefix { cidr: cidr.clone() })
        .collect()
}

/// Collapse route filter prefixes into a sorted set of CIDR strings
pub fn flatten_route_filter_prefixes(prefixes: &[RouteFilterPrefix]) -> Vec<String> {
    prefixes
        .iter()
        .map(|p| p.cidr.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Attributes shared by every kind of virtual interface
pub fn virtual_interface_attributes(
    account: &AccountContext,
    kind: VirtualInterfaceKind,
    vif: &VirtualInterface,
    tags: &HashMap<String, String>,
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    let string = |s: &str| Value::String(s.to_string());

    attributes.insert(
        "arn".to_string(),
        Value::String(Arn::virtual_interface(account, &vif.id).to_string()),
    );
    attributes.insert("connection_id".to_string(), string(&vif.connection_id));
    attributes.insert("name".to_string(), string(&vif.name));
    attributes.insert("vlan".to_string(), Value::Int(vif.vlan));
    attributes.insert("bgp_asn".to_string(), Value::Int(vif.asn));

    let optional = [
        ("bgp_auth_key", vif.auth_key.as_deref()),
        ("address_family", vif.address_family.map(|f| f.as_str())),
        ("customer_address", vif.customer_address.as_deref()),
        ("amazon_address", vif.amazon_address.as_deref()),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            attributes.insert(name.to_string(), string(value));
        }
    }

    attributes.insert("tags".to_string(), tags_to_value(tags));

    if kind.is_public() {
        let prefixes = flatten_route_filter_prefixes(&vif.route_filter_prefixes)
            .into_iter()
            .map(Value::String)
            .collect();
        attributes.insert("route_filter_prefixes".to_string(), Value::List(prefixes));
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AddressFamily;
    use crate::state::VirtualInterfaceState;

    fn vif() -> VirtualInterface {
        VirtualInterface {
            id: "dxvif-abc".to_string(),
            name: "edge".to_string(),
            connection_id: "dxcon-1".to_string(),
            vlan: 4094,
            asn: 65352,
            auth_key: Some("secret".to_string()),
            address_family: Some(AddressFamily::Ipv4),
            customer_address: Some("175.45.176.1/30".to_string()),
            amazon_address: None,
            state: VirtualInterfaceState::Available,
            route_filter_prefixes: expand_route_filter_prefixes(&[
                "210.52.109.0/24".to_string(),
                "175.45.176.0/22".to_string(),
                "210.52.109.0/24".to_string(),
            ]),
        }
    }

    #[test]
    fn expand_keeps_every_cidr() {
        let prefixes = expand_route_filter_prefixes(&["10.0.0.0/8".to_string()]);
        assert_eq!(
            prefixes,
            vec![RouteFilterPrefix {
                cidr: "10.0.0.0/8".to_string()
            }]
        );
    }

    #[test]
    fn flatten_sorts_and_dedups() {
        assert_eq!(
            flatten_route_filter_prefixes(&vif().route_filter_prefixes),
            vec!["175.45.176.0/22".to_string(), "210.52.109.0/24".to_string()]
        );
    }

    #[test]
    fn private_attributes_omit_route_filters() {
        let account = AccountContext::aws("us-east-1", "123456789012");
        let attrs = virtual_interface_attributes(
            &account,
            VirtualInterfaceKind::Private,
            &vif(),
            &HashMap::new(),
        );

        assert_eq!(
            attrs.get("arn"),
            Some(&Value::String(
                "arn:aws:directconnect:us-east-1:123456789012:dxvif/dxvif-abc".to_string()
            ))
        );
        assert_eq!(attrs.get("vlan"), Some(&Value::Int(4094)));
        assert_eq!(attrs.get("bgp_asn"), Some(&Value::Int(65352)));
        assert_eq!(attrs.get("address_family"), Some(&Value::String("ipv4".to_string())));
        assert!(!attrs.contains_key("amazon_address"));
        assert!(!attrs.contains_key("route_filter_prefixes"));
    }

    #[test]
    fn public_attributes_include_route_filters() {
        let account = AccountContext::aws("us-east-1", "123456789012");
        let attrs =
            virtual_interface_attributes(&account, VirtualInterfaceKind::Public, &vif(), &HashMap::new());

        assert_eq!(
            attrs.get("route_filter_prefixes"),
            Some(&Value::List(vec![
                Value::String("175.45.176.0/22".to_string()),
                Value::String("210.52.109.0/24".to_string()),
            ]))
        );
    }
}
