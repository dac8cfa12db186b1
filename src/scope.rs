//! The `(network, protocol, entity_id)` scoped key used as the durable
//! identity of every cached state record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the DeFi protocols this oracle recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    MinswapV1,
    MinswapV2,
    SundaeSwapV1,
    SundaeSwapV3,
    WingRidersV2,
    VyFi,
    Splash,
    GeniusYield,
    Butane,
    Indigo,
    Liqwid,
    Optim,
}

impl Protocol {
    pub const ALL: [Protocol; 12] = [
        Protocol::MinswapV1,
        Protocol::MinswapV2,
        Protocol::SundaeSwapV1,
        Protocol::SundaeSwapV3,
        Protocol::WingRidersV2,
        Protocol::VyFi,
        Protocol::Splash,
        Protocol::GeniusYield,
        Protocol::Butane,
        Protocol::Indigo,
        Protocol::Liqwid,
        Protocol::Optim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::MinswapV1 => "minswap_v1",
            Protocol::MinswapV2 => "minswap_v2",
            Protocol::SundaeSwapV1 => "sundaeswap_v1",
            Protocol::SundaeSwapV3 => "sundaeswap_v3",
            Protocol::WingRidersV2 => "wingriders_v2",
            Protocol::VyFi => "vyfi",
            Protocol::Splash => "splash",
            Protocol::GeniusYield => "genius_yield",
            Protocol::Butane => "butane",
            Protocol::Indigo => "indigo",
            Protocol::Liqwid => "liqwid",
            Protocol::Optim => "optim",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownProtocol;

impl fmt::Display for UnknownProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown protocol")
    }
}

impl std::error::Error for UnknownProtocol {}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(UnknownProtocol)
    }
}

/// The durable identity of a cached/persisted state record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedKey {
    pub network: String,
    pub protocol: Protocol,
    pub entity_id: String,
}

impl ScopedKey {
    pub fn new(network: impl Into<String>, protocol: Protocol, entity_id: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            protocol,
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.network, self.protocol, self.entity_id)
    }
}
