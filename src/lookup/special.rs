//! Reserved address ranges that are answered locally.
//!
//! Looking these up upstream costs quota and returns nothing useful, so the
//! pipeline serves a synthetic document for them instead.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use serde_json::{json, Value};

/// Prefix distinguishing locally answered cache keys from real lookups.
pub const PSEUDO_KEY_PREFIX: &str = "special:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScope {
    Unspecified,
    Loopback,
    Private,
    SharedAddress,
    LinkLocal,
    Multicast,
    Broadcast,
    Documentation,
    UniqueLocal,
}

impl AddressScope {
    pub fn description(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified address",
            Self::Loopback => "loopback address",
            Self::Private => "private network address",
            Self::SharedAddress => "carrier-grade NAT shared address",
            Self::LinkLocal => "link-local address",
            Self::Multicast => "multicast address",
            Self::Broadcast => "broadcast address",
            Self::Documentation => "documentation address",
            Self::UniqueLocal => "unique local address",
        }
    }
}

fn classify_v4(ip: Ipv4Addr) -> Option<AddressScope> {
    let [a, b, ..] = ip.octets();
    if ip.is_unspecified() {
        Some(AddressScope::Unspecified)
    } else if ip.is_loopback() {
        Some(AddressScope::Loopback)
    } else if ip.is_private() {
        Some(AddressScope::Private)
    } else if a == 100 && (b & 0xc0) == 64 {
        Some(AddressScope::SharedAddress)
    } else if ip.is_link_local() {
        Some(AddressScope::LinkLocal)
    } else if ip.is_broadcast() {
        Some(AddressScope::Broadcast)
    } else if ip.is_multicast() {
        Some(AddressScope::Multicast)
    } else if ip.is_documentation() {
        Some(AddressScope::Documentation)
    } else {
        None
    }
}

fn classify_v6(ip: Ipv6Addr) -> Option<AddressScope> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return classify_v4(v4);
    }

    let segments = ip.segments();
    if ip.is_unspecified() {
        Some(AddressScope::Unspecified)
    } else if ip.is_loopback() {
        Some(AddressScope::Loopback)
    } else if ip.is_multicast() {
        Some(AddressScope::Multicast)
    } else if (segments[0] & 0xffc0) == 0xfe80 {
        Some(AddressScope::LinkLocal)
    } else if (segments[0] & 0xfe00) == 0xfc00 {
        Some(AddressScope::UniqueLocal)
    } else if segments[0] == 0x2001 && segments[1] == 0x0db8 {
        Some(AddressScope::Documentation)
    } else {
        None
    }
}

/// Returns the reserved scope of `ip`, or `None` for a routable address.
pub fn classify(ip: IpAddr) -> Option<AddressScope> {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => classify_v6(v6),
    }
}

/// Cache key under which the local answer for `ip` is stored.
pub fn pseudo_key(ip: IpAddr) -> String {
    format!("{PSEUDO_KEY_PREFIX}{ip}")
}

/// The document served for a reserved address.
pub fn local_document(ip: IpAddr, scope: AddressScope) -> Value {
    json!({
        "ret": 200,
        "msg": "success",
        "data": {
            "ip": ip.to_string(),
            "scope": scope,
            "description": scope.description(),
        },
    })
}
