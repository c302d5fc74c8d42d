pub mod address;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod mapping;
pub mod mappings;
pub mod message;
pub mod mime;
pub mod resolver;
pub mod rewriter;
pub mod storage;

pub use address::*;
pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use event::*;
pub use forwarder::*;
pub use mapping::*;
pub use mappings::*;
pub use message::*;
pub use mime::*;
pub use resolver::*;
pub use rewriter::*;
pub use storage::*;
