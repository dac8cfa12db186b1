//! One module per recognized protocol, each implementing one of the
//! `crate::parsers` contract traits against that protocol's Plutus datum
//! layout. [`register_all`] wires every parser into a fresh registry in one
//! call — the form the coordinator uses at startup.

pub mod butane;
pub mod genius_yield;
pub mod indigo;
pub mod liqwid;
pub mod minswap_v1;
pub mod minswap_v2;
pub mod optim;
pub mod splash;
pub mod sundaeswap_v1;
pub mod sundaeswap_v3;
pub mod vyfi;
pub mod wingriders_v2;

use crate::parsers::ParserRegistry;

/// Register every protocol parser this crate knows about.
pub fn register_all(registry: &mut ParserRegistry) {
    registry
        .register_pool(Box::new(minswap_v1::MinswapV1Parser))
        .register_pool(Box::new(minswap_v2::MinswapV2Parser))
        .register_pool(Box::new(sundaeswap_v1::SundaeSwapV1Parser))
        .register_pool(Box::new(sundaeswap_v3::SundaeSwapV3Parser))
        .register_pool(Box::new(wingriders_v2::WingRidersV2Parser))
        .register_pool(Box::new(vyfi::VyFiParser))
        .register_pool(Box::new(splash::SplashParser))
        .register_order(Box::new(genius_yield::GeniusYieldParser))
        .register_cdp(Box::new(butane::ButaneParser))
        .register_cdp(Box::new(indigo::IndigoParser))
        .register_lending(Box::new(liqwid::LiqwidParser))
        .register_bond(Box::new(optim::OptimParser));
}
