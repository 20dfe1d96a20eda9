//! Host address allocation within the server subnet

use crate::error::{Error, Result};
use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Pick the lowest free host address in `subnet`.
///
/// The network and broadcast addresses and the server's own interface
/// address are never handed out. Enumeration is ascending and free of
/// randomness, so retrying after a crash that lost no registry state lands
/// on the same candidate.
pub fn allocate(
    subnet: Ipv4Network,
    server: Ipv4Addr,
    in_use: &HashSet<Ipv4Addr>,
) -> Result<Ipv4Addr> {
    let network = subnet.network();
    let broadcast = subnet.broadcast();
    for candidate in subnet.iter() {
        if candidate == network || candidate == broadcast || candidate == server {
            continue;
        }
        if !in_use.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::PoolExhausted {
        subnet: subnet.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet() -> Ipv4Network {
        "10.8.0.0/24".parse().unwrap()
    }

    fn server() -> Ipv4Addr {
        Ipv4Addr::new(10, 8, 0, 1)
    }

    #[test]
    fn test_first_host_after_server() {
        let addr = allocate(subnet(), server(), &HashSet::new()).unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 8, 0, 2));
    }

    #[test]
    fn test_skips_allocated_addresses() {
        let in_use: HashSet<Ipv4Addr> =
            [Ipv4Addr::new(10, 8, 0, 2), Ipv4Addr::new(10, 8, 0, 3)].into();
        let addr = allocate(subnet(), server(), &in_use).unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 8, 0, 4));
    }

    #[test]
    fn test_reuses_freed_address() {
        // .2 was freed while .3 stays allocated
        let in_use: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 8, 0, 3)].into();
        let addr = allocate(subnet(), server(), &in_use).unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 8, 0, 2));
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let in_use: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 8, 0, 2)].into();
        let a = allocate(subnet(), server(), &in_use).unwrap();
        let b = allocate(subnet(), server(), &in_use).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pool_exhausted() {
        // A /30 has two usable hosts; .1 is the server, .2 is taken.
        let small: Ipv4Network = "10.8.0.0/30".parse().unwrap();
        let in_use: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 8, 0, 2)].into();
        let err = allocate(small, Ipv4Addr::new(10, 8, 0, 1), &in_use).unwrap_err();
        assert!(matches!(err, Error::PoolExhausted { .. }));
    }

    #[test]
    fn test_never_hands_out_reserved_addresses() {
        let small: Ipv4Network = "10.8.0.0/30".parse().unwrap();
        let addr = allocate(small, Ipv4Addr::new(10, 8, 0, 1), &HashSet::new()).unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 8, 0, 2));
    }
}
