//! # dexter-oracle
//!
//! An on-chain DeFi state oracle core for Cardano: decodes Plutus datums
//! from twelve DEX, lending, order-book, CDP, and bond protocols into a
//! small set of protocol-agnostic state records, keeps a live cache of
//! that state, tracks unconfirmed mempool effects, and persists confirmed
//! state to an embedded store.
//!
//! This crate has no chain-sync or mempool client of its own — see
//! [`event::EventSource`] for the seam a host binary implements to drive
//! [`coordinator::OracleCoordinator`] from a real indexer.
//!
//! ## Supported protocols
//!
//! | Protocol | Contract kind |
//! |---|---|
//! | Minswap v1 | Pool |
//! | Minswap v2 | Pool |
//! | SundaeSwap v1 | Pool |
//! | SundaeSwap v3 | Pool |
//! | WingRiders v2 | Pool |
//! | VyFi | Pool |
//! | Splash | Pool |
//! | Genius Yield | Order |
//! | Butane | CDP |
//! | Indigo | CDP |
//! | Liqwid | Lending |
//! | Optim | Bond / price feed |
//!
//! ## Quick start
//!
//! ```no_run
//! use dexter_oracle::coordinator::OracleCoordinator;
//! use dexter_oracle::event::OracleConfig;
//! use dexter_oracle::parsers::ParserRegistry;
//! use dexter_oracle::protocols;
//!
//! let mut registry = ParserRegistry::new();
//! protocols::register_all(&mut registry);
//!
//! let mut config = OracleConfig::new("mainnet", "./oracle-data");
//! config.pool_addresses.insert("addr1...".to_string());
//!
//! let coordinator = OracleCoordinator::new(config, registry).unwrap();
//! let mut updates = coordinator.subscribe_price_updates();
//! ```

pub mod asset;
pub mod cache;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod mempool;
pub mod models;
pub mod parsers;
pub mod persistence;
pub mod protocols;
pub mod scope;

pub use coordinator::OracleCoordinator;
pub use error::{DecodeError, ParseInputError, StorageError};
pub use parsers::ParserRegistry;
pub use scope::{Protocol, ScopedKey};
