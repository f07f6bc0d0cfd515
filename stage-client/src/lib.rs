//! Stage Client - backend transports and directory sync
//!
//! Both wire strategies implement [`StageBackend`], so commands stay free of
//! transport branching. [`connect`] picks the strategy from the resolved
//! configuration.

pub mod backend;
pub mod direct;
pub mod rpc;
pub mod sync;

pub use backend::{connect, StageBackend};
pub use direct::{DirectTransport, SESSION_HEADER};
pub use rpc::{Endpoint, RpcTransport};
pub use sync::{collect_bundle, push, read_local, PushOutcome, PushRequest};
