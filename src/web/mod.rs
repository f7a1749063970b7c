//! Request handling: parameter contracts, binding, routing, and response
//! serialization.

mod binder;
mod request;
mod response;
mod router;

pub use binder::{HandlerArgs, ParamSpec};
pub use request::{PathParams, RequestParts};
pub use response::{render, Reply};
pub use router::{HandlerResult, Router};
