//! IPv4 address and CIDR block utilities.
//!
//! Provides [`Ipv4`] for representing a CIDR block, along with the subnet
//! arithmetic the subnet planner allocates with.

use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Maximum length for an IPv4 prefix (32 bits).
pub const MAX_LENGTH: u8 = 32;

/// Addresses AWS keeps back in every subnet (network, router, DNS, future, broadcast).
pub const AWS_RESERVED_ADDRESSES: u64 = 5;

/// Convert a CIDR prefix length to a netmask as u32.
///
/// # Examples
/// ```
/// use vpc_topology::models::get_cidr_mask;
/// assert_eq!(get_cidr_mask(24).unwrap(), 0xFFFFFF00);
/// ```
pub fn get_cidr_mask(len: u8) -> Result<u32, Box<dyn Error>> {
    if len > MAX_LENGTH {
        Err(format!("Prefix length /{len} is too long").into())
    } else {
        Ok(mask_bits(len))
    }
}

fn mask_bits(len: u8) -> u32 {
    let len = len.min(MAX_LENGTH);
    u32::MAX.checked_shl(u32::from(MAX_LENGTH - len)).unwrap_or(0)
}

/// Get the network address for a given IP and prefix length.
pub fn cut_addr(addr: Ipv4Addr, len: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    let mask = get_cidr_mask(len)?;
    Ok(Ipv4Addr::from(u32::from(addr) & mask))
}

/// Calculate the broadcast (highest) address for a given IP and prefix length.
pub fn broadcast_addr(addr: Ipv4Addr, len: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    let mask = get_cidr_mask(len)?;
    Ok(Ipv4Addr::from((u32::from(addr) & mask) | !mask))
}

/// Returns the first address after the block `addr/len`.
pub fn ip_after_subnet(addr: Ipv4Addr, len: u8) -> Result<Ipv4Addr, Box<dyn Error>> {
    let network = u32::from(cut_addr(addr, len)?);
    let block_size = 1u64 << (MAX_LENGTH - len);
    let next = u64::from(network) + block_size;
    u32::try_from(next)
        .map(Ipv4Addr::from)
        .map_err(|_| format!("No address space left after {addr}/{len}").into())
}

/// Calculate the block that follows `ipv4`.
///
/// If `mask` is provided the returned block uses that prefix length, aligned
/// on its own boundary past the end of `ipv4`.
pub fn next_subnet_ipv4(ipv4: Ipv4, mask: Option<u8>) -> Result<Ipv4, Box<dyn Error>> {
    let new_mask = mask.unwrap_or(ipv4.mask);
    let start = if new_mask <= ipv4.mask {
        ip_after_subnet(ipv4.addr, new_mask)?
    } else {
        // smaller block: continue straight after the current broadcast
        ip_after_subnet(ipv4.hi(), new_mask)?
    };
    Ok(Ipv4 {
        addr: start,
        mask: new_mask,
    })
}

/// Number of usable host addresses in an AWS subnet of the given prefix.
pub fn num_aws_hosts(len: u8) -> Result<u64, Box<dyn Error>> {
    if len > 28 {
        // /28 is the smallest subnet AWS will create
        Err(format!("Prefix length /{len} is too small for a VPC subnet").into())
    } else {
        Ok((1u64 << (MAX_LENGTH - len)) - AWS_RESERVED_ADDRESSES)
    }
}

/// IPv4 CIDR block.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Ipv4 {
    /// The IPv4 address.
    pub addr: Ipv4Addr,
    /// The prefix length (0-32).
    pub mask: u8,
}

impl Serialize for Ipv4 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4 {
    fn deserialize<D>(deserializer: D) -> Result<Ipv4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4::new(&s).map_err(|e| de::Error::custom(format!("invalid CIDR '{s}': {e}")))
    }
}

impl Ipv4 {
    /// Create a new [`Ipv4`] from a CIDR string (e.g., "10.0.0.0/16").
    pub fn new(addr_cidr: &str) -> Result<Ipv4, Box<dyn Error>> {
        let (addr, mask) = addr_cidr
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("Invalid address/mask '{addr_cidr}'"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| format!("Invalid address {addr}"))?;
        let mask: u8 = mask
            .parse()
            .map_err(|_| format!("Invalid prefix length {mask}"))?;
        if mask > MAX_LENGTH {
            return Err(format!("Prefix length /{mask} is too long").into());
        }
        Ok(Ipv4 { addr, mask })
    }

    /// The block covering every IPv4 address.
    pub fn any() -> Ipv4 {
        Ipv4 {
            addr: Ipv4Addr::UNSPECIFIED,
            mask: 0,
        }
    }

    /// Get the lowest (network) address in the block.
    pub fn lo(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & mask_bits(self.mask))
    }

    /// Get the highest (broadcast) address in the block.
    pub fn hi(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.lo()) | !mask_bits(self.mask))
    }

    /// This block normalised to its network address.
    pub fn network(&self) -> Ipv4 {
        Ipv4 {
            addr: self.lo(),
            mask: self.mask,
        }
    }

    /// First block of prefix `len` inside this one.
    pub fn first_subnet(&self, len: u8) -> Result<Ipv4, Box<dyn Error>> {
        if len <= self.mask || len > MAX_LENGTH {
            return Err(format!("Cannot carve a /{len} out of {self}").into());
        }
        Ok(Ipv4 {
            addr: self.lo(),
            mask: len,
        })
    }

    /// True when `other` lies entirely inside this block.
    pub fn contains(&self, other: &Ipv4) -> bool {
        self.mask <= other.mask && self.lo() <= other.lo() && other.hi() <= self.hi()
    }

    /// True when the two blocks share at least one address.
    pub fn overlaps(&self, other: &Ipv4) -> bool {
        self.lo() <= other.hi() && other.lo() <= self.hi()
    }
}

impl FromStr for Ipv4 {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4::new(s)
    }
}

impl std::fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cidr_mask() {
        assert_eq!(get_cidr_mask(0).unwrap(), 0x00000000);
        assert_eq!(get_cidr_mask(16).unwrap(), 0xFFFF0000);
        assert_eq!(get_cidr_mask(24).unwrap(), 0xFFFFFF00);
        assert_eq!(get_cidr_mask(32).unwrap(), 0xFFFFFFFF);
        assert!(get_cidr_mask(33).is_err());
    }

    #[test]
    fn test_cut_and_broadcast() {
        let ip = Ipv4Addr::new(10, 0, 3, 42);
        assert_eq!(cut_addr(ip, 24).unwrap(), Ipv4Addr::new(10, 0, 3, 0));
        assert_eq!(cut_addr(ip, 16).unwrap(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(
            broadcast_addr(ip, 24).unwrap(),
            Ipv4Addr::new(10, 0, 3, 255)
        );
        assert_eq!(
            broadcast_addr(ip, 16).unwrap(),
            Ipv4Addr::new(10, 0, 255, 255)
        );
        assert!(broadcast_addr(ip, 33).is_err());
    }

    #[test]
    fn test_ip_after_subnet() {
        assert_eq!(
            ip_after_subnet(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap(),
            Ipv4Addr::new(10, 0, 1, 0)
        );
        assert_eq!(
            ip_after_subnet(Ipv4Addr::new(10, 0, 255, 0), 24).unwrap(),
            Ipv4Addr::new(10, 1, 0, 0)
        );
        assert!(ip_after_subnet(Ipv4Addr::new(255, 255, 255, 0), 24).is_err());
    }

    #[test]
    fn test_next_subnet_ipv4() {
        let first = Ipv4::new("10.0.0.0/24").unwrap();
        assert_eq!(
            next_subnet_ipv4(first, None).unwrap(),
            Ipv4::new("10.0.1.0/24").unwrap()
        );

        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        assert_eq!(
            next_subnet_ipv4(vpc, Some(24)).unwrap(),
            Ipv4::new("10.1.0.0/24").unwrap()
        );

        let small = Ipv4::new("10.0.8.0/28").unwrap();
        assert_eq!(
            next_subnet_ipv4(small, Some(24)).unwrap(),
            Ipv4::new("10.0.9.0/24").unwrap()
        );
    }

    #[test]
    fn test_num_aws_hosts() {
        assert_eq!(num_aws_hosts(24).unwrap(), 251);
        assert_eq!(num_aws_hosts(16).unwrap(), 65531);
        assert_eq!(num_aws_hosts(28).unwrap(), 11);
        assert!(num_aws_hosts(29).is_err());
    }

    #[test]
    fn test_new_rejects_garbage() {
        assert!(Ipv4::new("10.0.0.0").is_err());
        assert!(Ipv4::new("10.0.0.300/24").is_err());
        assert!(Ipv4::new("10.0.0.0/33").is_err());
        assert_eq!(
            " 10.0.0.0/16 ".parse::<Ipv4>().unwrap(),
            Ipv4::new("10.0.0.0/16").unwrap()
        );
    }

    #[test]
    fn test_contains_and_overlaps() {
        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        let a = Ipv4::new("10.0.1.0/24").unwrap();
        let b = Ipv4::new("10.0.2.0/24").unwrap();
        let outside = Ipv4::new("10.1.0.0/24").unwrap();
        let straddle = Ipv4::new("10.0.1.128/25").unwrap();

        assert!(vpc.contains(&a));
        assert!(!vpc.contains(&outside));
        assert!(!a.contains(&vpc));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&straddle));
        assert!(vpc.overlaps(&a));
        assert!(Ipv4::any().contains(&outside));
    }

    #[test]
    fn test_first_subnet() {
        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        assert_eq!(
            vpc.first_subnet(24).unwrap(),
            Ipv4::new("10.0.0.0/24").unwrap()
        );
        assert!(vpc.first_subnet(16).is_err());
        assert!(vpc.first_subnet(8).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let ip = Ipv4::new("10.0.0.0/16").unwrap();
        let json = serde_json::to_string(&ip).unwrap();
        assert_eq!(json, "\"10.0.0.0/16\"");
        let back: Ipv4 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ip);
        assert!(serde_json::from_str::<Ipv4>("\"10.0.0.0\"").is_err());
    }
}
