//! Virtual interface resource schemas

use converge_core::resource::Value;
use converge_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::state::VirtualInterfaceKind;

/// 802.1Q VLAN ID type (1-4094)
pub fn vlan_id() -> AttributeType {
    types::int_with("VlanId", |value| match value {
        Value::Int(n) if (1..=4094).contains(n) => Ok(()),
        Value::Int(n) => Err(format!("VLAN must be between 1 and 4094, got {}", n)),
        _ => Err("Expected integer".to_string()),
    })
}

/// BGP address family
pub fn address_family() -> AttributeType {
    AttributeType::Enum(vec!["ipv4".to_string(), "ipv6".to_string()])
}

/// Schema for the given kind of virtual interface
pub fn virtual_interface_schema(kind: VirtualInterfaceKind) -> ResourceSchema {
    let schema = ResourceSchema::new(kind.resource_type())
        .with_description("AWS Direct Connect virtual interface")
        .attribute(
            AttributeSchema::new("arn", AttributeType::String)
                .computed()
                .with_description("ARN of the virtual interface"),
        )
        .attribute(
            AttributeSchema::new("connection_id", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("ConnectionId"),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("VirtualInterfaceName"),
        )
        .attribute(
            AttributeSchema::new("vlan", vlan_id())
                .required()
                .force_new()
                .with_provider_name("Vlan"),
        )
        .attribute(
            AttributeSchema::new("bgp_asn", AttributeType::Int)
                .required()
                .force_new()
                .with_provider_name("Asn"),
        )
        .attribute(
            AttributeSchema::new("bgp_auth_key", AttributeType::String)
                .force_new()
                .with_provider_name("AuthKey"),
        )
        .attribute(
            AttributeSchema::new("address_family", address_family())
                .required()
                .force_new()
                .with_provider_name("AddressFamily"),
        )
        .attribute(
            AttributeSchema::new("customer_address", AttributeType::String)
                .force_new()
                .with_provider_name("CustomerAddress"),
        )
        .attribute(
            AttributeSchema::new("amazon_address", AttributeType::String)
                .force_new()
                .with_provider_name("AmazonAddress"),
        )
        .attribute(
            AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                .with_description("Tags are the only attribute updated in place"),
        )
        .attribute(AttributeSchema::new(
            "timeouts",
            AttributeType::Map(Box::new(AttributeType::String)),
        ));

    if kind.is_public() {
        schema.attribute(
            AttributeSchema::new("route_filter_prefixes", AttributeType::List(Box::new(types::cidr())))
                .force_new()
                .with_provider_name("RouteFilterPrefixes"),
        )
    } else {
        schema
    }
}
