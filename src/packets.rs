use crate::packets::client::ClientPackets;

pub(crate) mod client;
pub(crate) mod parse;
pub(crate) mod server;

/// Where a packet produced by a handler goes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outbound {
    /// Only the connection that sent the request.
    Reply(ClientPackets),
    /// Every joined connection, the sender included.
    Broadcast(ClientPackets),
    /// Every joined connection except the sender.
    BroadcastOthers(ClientPackets),
}
