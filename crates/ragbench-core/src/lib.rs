//! Shared data model, filter expressions, port values, errors, configuration
//! and the trait seams implemented by the engine crates.
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod filter;
pub mod ports;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::Filter;
pub use ports::{PortValue, Ports};
pub use types::{ChatMessage, Document, DocumentMeta, ParentRef, Query, QueryRecord};
