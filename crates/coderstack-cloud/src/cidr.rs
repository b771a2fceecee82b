//! IPv4 address blocks and sequential subnet allocation

use crate::error::{CloudError, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 CIDR block such as `10.0.0.0/16`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        let text = format!("{}/{}", network, prefix);
        if prefix > 32 {
            return Err(invalid(&text, "prefix length must be between 0 and 32"));
        }
        if u32::from(network) & !mask(prefix) != 0 {
            return Err(invalid(&text, "host bits must be zero"));
        }
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix
            && u32::from(other.network) & mask(self.prefix) == u32::from(self.network)
    }

    /// Start allocating subnets from the beginning of this block
    pub fn allocator(&self) -> CidrAllocator {
        CidrAllocator {
            block: *self,
            offset: 0,
        }
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| invalid(s, "expected <address>/<prefix>"))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| invalid(s, "address is not a valid IPv4 address"))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| invalid(s, "prefix length is not a number"))?;
        Ipv4Cidr::new(network, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Hands out consecutive, aligned subnets of a block
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    block: Ipv4Cidr,
    offset: u64,
}

impl CidrAllocator {
    pub fn allocate(&mut self, prefix: u8) -> Result<Ipv4Cidr> {
        if prefix < self.block.prefix || prefix > 32 {
            return Err(invalid(
                &self.block.to_string(),
                &format!("cannot carve a /{} subnet out of this block", prefix),
            ));
        }

        let size = 1u64 << (32 - u32::from(prefix));
        let start = self.offset.div_ceil(size) * size;
        if start + size > self.block.size() {
            return Err(invalid(
                &self.block.to_string(),
                &format!("address space exhausted while allocating a /{} subnet", prefix),
            ));
        }

        self.offset = start + size;
        let network = Ipv4Addr::from(u32::from(self.block.network) + start as u32);
        Ipv4Cidr::new(network, prefix)
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn invalid(cidr: &str, reason: &str) -> CloudError {
    CloudError::InvalidCidr {
        cidr: cidr.to_string(),
        reason: reason.to_string(),
    }
}
