mod client;
#[cfg(test)]
pub(crate) mod mock;
mod transport;

pub use client::{EgressClient, MAX_BODY_BYTES};
pub use transport::{FetchReply, FetchRequest, ReqwestTransport, Transport};
