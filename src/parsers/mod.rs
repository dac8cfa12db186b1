//! The five parser-contract traits every protocol module implements, plus
//! the registry the coordinator dispatches through.
//!
//! A parser's single method returns `Result<Option<State>, DecodeError>`:
//! `Ok(None)` means "structurally fine, just not my datum" and is never
//! treated as an error anywhere in this crate — the same output can be
//! offered to every registered parser and only one is expected to claim it.

use crate::error::DecodeError;
use crate::models::{BondOrFeed, CDPState, LendingState, OrderState, PoolState};
use crate::scope::Protocol;

/// Transaction metadata every parser needs, bundled so the five trait
/// methods don't each repeat a four-argument tail.
#[derive(Debug, Clone)]
pub struct DatumContext {
    pub tx_hash: String,
    pub tx_index: u32,
    pub slot: u64,
    pub timestamp: i64,
}

impl DatumContext {
    pub fn new(tx_hash: impl Into<String>, tx_index: u32, slot: u64, timestamp: i64) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            tx_index,
            slot,
            timestamp,
        }
    }
}

pub trait PoolParser: Send + Sync {
    fn protocol(&self) -> Protocol;
    fn parse_pool_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<PoolState>, DecodeError>;

    /// Fill in a `reserves_unknown` state from the UTxO's multi-asset value.
    /// Called only when `parse_pool_datum` returned a state with
    /// `reserves_unknown == true`. The default passes `state` through
    /// unchanged, for protocols whose datum already carries complete
    /// reserves.
    fn refine_with_value(
        &self,
        _datum: &[u8],
        _value: &[(String, u64)],
        state: PoolState,
    ) -> Result<Option<PoolState>, DecodeError> {
        Ok(Some(state))
    }
}

pub trait LendingParser: Send + Sync {
    fn protocol(&self) -> Protocol;
    fn parse_lending_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<LendingState>, DecodeError>;
}

pub trait OrderParser: Send + Sync {
    fn protocol(&self) -> Protocol;
    fn parse_order_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<OrderState>, DecodeError>;
}

pub trait CDPParser: Send + Sync {
    fn protocol(&self) -> Protocol;
    fn parse_cdp_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<CDPState>, DecodeError>;
}

pub trait BondParser: Send + Sync {
    fn protocol(&self) -> Protocol;
    fn parse_bond_datum(
        &self,
        datum: &[u8],
        ctx: &DatumContext,
    ) -> Result<Option<BondOrFeed>, DecodeError>;
}

/// One boxed parser per protocol per contract kind. The coordinator holds
/// exactly one of these and never knows about a protocol module directly.
#[derive(Default)]
pub struct ParserRegistry {
    pool_parsers: Vec<Box<dyn PoolParser>>,
    lending_parsers: Vec<Box<dyn LendingParser>>,
    order_parsers: Vec<Box<dyn OrderParser>>,
    cdp_parsers: Vec<Box<dyn CDPParser>>,
    bond_parsers: Vec<Box<dyn BondParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pool(&mut self, parser: Box<dyn PoolParser>) -> &mut Self {
        self.pool_parsers.push(parser);
        self
    }

    pub fn register_lending(&mut self, parser: Box<dyn LendingParser>) -> &mut Self {
        self.lending_parsers.push(parser);
        self
    }

    pub fn register_order(&mut self, parser: Box<dyn OrderParser>) -> &mut Self {
        self.order_parsers.push(parser);
        self
    }

    pub fn register_cdp(&mut self, parser: Box<dyn CDPParser>) -> &mut Self {
        self.cdp_parsers.push(parser);
        self
    }

    pub fn register_bond(&mut self, parser: Box<dyn BondParser>) -> &mut Self {
        self.bond_parsers.push(parser);
        self
    }

    /// Offer `datum` to every registered pool parser; the first one that
    /// claims it (`Ok(Some(_))`) wins. A parser returning an error is
    /// logged at debug level and treated the same as "not my datum" so one
    /// malformed-but-claimed datum never blocks the rest of the registry.
    ///
    /// A claimed state with `reserves_unknown` is passed through the
    /// claiming parser's `refine_with_value` against `value` — the UTxO's
    /// multi-asset amounts — before being returned. A refinement failure is
    /// logged and yields `None` rather than a half-complete state.
    pub fn parse_pool(&self, datum: &[u8], ctx: &DatumContext, value: &[(String, u64)]) -> Option<PoolState> {
        for parser in &self.pool_parsers {
            match parser.parse_pool_datum(datum, ctx) {
                Ok(Some(state)) => {
                    if !state.reserves_unknown {
                        return Some(state);
                    }
                    return match parser.refine_with_value(datum, value, state) {
                        Ok(refined) => refined,
                        Err(err) => {
                            tracing::debug!(protocol = %parser.protocol(), error = %err, "pool value refinement rejected");
                            None
                        }
                    };
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(protocol = %parser.protocol(), error = %err, "pool datum rejected");
                }
            }
        }
        None
    }

    pub fn parse_lending(&self, datum: &[u8], ctx: &DatumContext) -> Option<LendingState> {
        for parser in &self.lending_parsers {
            match parser.parse_lending_datum(datum, ctx) {
                Ok(Some(state)) => return Some(state),
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(protocol = %parser.protocol(), error = %err, "lending datum rejected");
                }
            }
        }
        None
    }

    pub fn parse_order(&self, datum: &[u8], ctx: &DatumContext) -> Option<OrderState> {
        for parser in &self.order_parsers {
            match parser.parse_order_datum(datum, ctx) {
                Ok(Some(state)) => return Some(state),
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(protocol = %parser.protocol(), error = %err, "order datum rejected");
                }
            }
        }
        None
    }

    pub fn parse_cdp(&self, datum: &[u8], ctx: &DatumContext) -> Option<CDPState> {
        for parser in &self.cdp_parsers {
            match parser.parse_cdp_datum(datum, ctx) {
                Ok(Some(state)) => return Some(state),
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(protocol = %parser.protocol(), error = %err, "cdp datum rejected");
                }
            }
        }
        None
    }

    pub fn parse_bond(&self, datum: &[u8], ctx: &DatumContext) -> Option<BondOrFeed> {
        for parser in &self.bond_parsers {
            match parser.parse_bond_datum(datum, ctx) {
                Ok(Some(state)) => return Some(state),
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(protocol = %parser.protocol(), error = %err, "bond datum rejected");
                }
            }
        }
        None
    }
}
