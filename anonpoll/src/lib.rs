#[macro_use]
extern crate serde;

mod acl;
mod ballot;
mod config;
mod decryption;
mod error;
mod event;
mod handle;
mod identity;
mod ledger;
mod registry;
mod serde_hex;
mod service;
mod signed;
mod store;
mod util;

pub use acl::*;
pub use ballot::*;
pub use config::*;
pub use decryption::*;
pub use error::*;
pub use event::*;
pub use handle::*;
pub use identity::*;
pub use ledger::*;
pub use registry::*;
pub use serde_hex::*;
pub use service::*;
pub use signed::*;
pub use store::*;
pub use util::*;
