//! Portal Common Types
//!
//! Shared types used by the backend and any frontend/API client:
//! the mirrored user record and the RPC call/reply envelope.

pub mod rpc;
pub mod user;

pub use rpc::{FieldError, RpcCall, RpcError, RpcErrorCode, RpcReply, RpcRequest, RpcResponse};
pub use user::User;
