//! # holdfast-wire: protocol messages
//!
//! Two protocols run between nodes:
//!
//! ## Action protocol
//! - `PUT/MOD/DEL/LINK/CLOSE/OPEN/MIGRATE_REQUEST` carry a [`HoldReq`] asking a
//!   holding node to validate and store a change
//! - `GET_REQUEST` carries a [`GetReq`], `GETLINK_REQUEST` a [`LinkQuery`]
//! - `LISTADD_REQUEST` carries a [`ListAddReq`] with a warrant
//! - `APP_MESSAGE` carries an application [`AppMsg`]
//!
//! ## Validate protocol
//! - `VALIDATE_*_REQUEST` carry a [`ValidateQuery`] from a holding node back to
//!   the source of a change, answered with a [`ValidateResponse`]
//!
//! Messages and responses are encoded with `postcard`.

mod error;
mod message;
mod response;

pub use error::WireError;
pub use message::{
    AppMsg, Body, GetReq, HoldReq, LinkQuery, ListAddReq, ListType, Message, MsgType, Protocol,
    ValidateQuery,
};
pub use response::{
    CloserPeersResp, ErrorKind, ErrorResp, GetResp, HoldResp, LinkQueryResp, Package, Response,
    TaggedHash, ValidateResponse,
};
