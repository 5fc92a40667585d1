//! The UC server core: resource tree, dispatcher, data model, and the
//! backend/auth provider seams. Everything here is transport-agnostic
//! except [`dispatch::handle`], which is an Axum handler meant to be
//! mounted as the sole fallback route behind `uc-http`'s CORS layer.

pub mod auth_iface;
pub mod backend;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod model;
pub mod notify;
pub mod pairing;
pub mod trie;
pub mod tree;
pub mod xml;

pub use dispatch::{AppState, HandlerResponse, PowerMode, RequestContext, ResourceHandler};
pub use error::{UcError, UcResult};
