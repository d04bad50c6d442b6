//! Local address discovery

use crate::error::{DevenvError, Result};
use std::net::{IpAddr, Ipv4Addr};

/// Which interface address counts as "the" local address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPolicy {
    /// When set, only addresses starting with this prefix qualify
    pub required_prefix: Option<String>,
}

impl AddressPolicy {
    /// Accept any non-loopback IPv4 address
    pub fn any() -> Self {
        Self::default()
    }

    /// Accept only addresses starting with `prefix`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            required_prefix: Some(prefix.into()),
        }
    }

    /// Pick the first qualifying address among `candidates`
    pub fn select(&self, candidates: &[IpAddr]) -> Option<Ipv4Addr> {
        candidates.iter().find_map(|candidate| match candidate {
            IpAddr::V4(v4) if !v4.is_loopback() && self.allows(v4) => Some(*v4),
            _ => None,
        })
    }

    fn allows(&self, address: &Ipv4Addr) -> bool {
        match &self.required_prefix {
            Some(prefix) => address.to_string().starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// Source of the host's current local address
pub trait AddressProbe: Send + Sync {
    /// The local address, `None` when no interface qualifies
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Probes the host's network interfaces
#[derive(Debug, Clone, Default)]
pub struct SystemProbe {
    policy: AddressPolicy,
}

impl SystemProbe {
    /// Probe applying `policy`
    pub fn new(policy: AddressPolicy) -> Self {
        Self { policy }
    }
}

impl AddressProbe for SystemProbe {
    fn local_address(&self) -> Option<Ipv4Addr> {
        match interface_addresses() {
            Ok(addresses) => self.policy.select(&addresses),
            Err(e) => {
                tracing::warn!("Failed to list interface addresses: {}", e);
                None
            }
        }
    }
}

/// Always reports the same address
#[derive(Debug, Clone)]
pub struct FixedProbe(pub Option<Ipv4Addr>);

impl AddressProbe for FixedProbe {
    fn local_address(&self) -> Option<Ipv4Addr> {
        self.0
    }
}

/// Addresses of all interfaces, in the order the system reports them
#[cfg(unix)]
pub fn interface_addresses() -> Result<Vec<IpAddr>> {
    use std::net::Ipv6Addr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs initialises `head` on success; the list is freed below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(DevenvError::Network(format!(
            "getifaddrs failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    let mut addresses = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` is a non-null node of the list returned by getifaddrs.
        let entry = unsafe { &*cursor };
        if !entry.ifa_addr.is_null() {
            // SAFETY: ifa_addr is non-null and the family field selects the concrete layout.
            let family = i32::from(unsafe { (*entry.ifa_addr).sa_family });
            if family == libc::AF_INET {
                // SAFETY: an AF_INET address is laid out as sockaddr_in.
                let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
                addresses.push(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))));
            } else if family == libc::AF_INET6 {
                // SAFETY: an AF_INET6 address is laid out as sockaddr_in6.
                let sin6 = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in6) };
                addresses.push(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)));
            }
        }
        cursor = entry.ifa_next;
    }

    // SAFETY: `head` came from a successful getifaddrs call and is freed once.
    unsafe { libc::freeifaddrs(head) };
    Ok(addresses)
}

/// Addresses of all interfaces, in the order the system reports them
#[cfg(not(unix))]
pub fn interface_addresses() -> Result<Vec<IpAddr>> {
    Err(DevenvError::Network(
        "interface enumeration is only supported on unix".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<IpAddr> {
        vec![
            "127.0.0.1".parse().unwrap(),
            "fe80::1".parse().unwrap(),
            "192.168.1.20".parse().unwrap(),
            "172.28.0.4".parse().unwrap(),
        ]
    }

    #[test]
    fn test_prefers_first_non_loopback_ipv4() {
        let selected = AddressPolicy::any().select(&candidates());
        assert_eq!(selected, Some(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn test_prefix_policy_skips_others() {
        let selected = AddressPolicy::with_prefix("172.28").select(&candidates());
        assert_eq!(selected, Some(Ipv4Addr::new(172, 28, 0, 4)));

        let none = AddressPolicy::with_prefix("10.").select(&candidates());
        assert_eq!(none, None);
    }

    #[test]
    fn test_loopback_only() {
        let only_loopback = vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()];
        assert_eq!(AddressPolicy::any().select(&only_loopback), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_interface_addresses_lists_something() {
        // Every unix host has at least a loopback interface.
        let addresses = interface_addresses().unwrap();
        assert!(!addresses.is_empty());
    }
}
