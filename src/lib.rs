//! Action-message protocol core for a peer-to-peer marketplace.
//!
//! Messages are content-hashed, built by factories, routed by action tag and
//! applied by processors that keep the per-item bid and escrow lineages.
pub mod config;
pub mod entity;
pub mod error;
pub mod factory;
pub mod hash;
pub mod lock;
pub mod memory;
pub mod message;
pub mod processor;
pub mod repository;
pub mod request;
pub mod router;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

pub use config::MarketConfig;
pub use error::{ProcessError, ValidationError, ValidationErrors};
pub use message::{ActionMessage, ActionType, Envelope};
pub use service::{Collaborators, MarketService};
