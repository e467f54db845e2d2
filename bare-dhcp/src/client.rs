use rand_core::RngCore;

use super::*;

/// A DHCP client building Discover and Request messages and recognizing the server's replies.
///
/// The client is unaware of the IP/UDP transport and works purely in terms of `Message`s.
pub struct Client<T> {
    pub rng: T,
    pub mac: [u8; 6],
}

impl<T> Client<T>
where
    T: RngCore,
{
    pub const fn new(rng: T, mac: [u8; 6]) -> Self {
        Self { rng, mac }
    }

    /// Starts a new transaction with a broadcast DHCPDISCOVER.
    /// Returns the message and the freshly generated transaction id.
    pub fn discover<'o>(
        &mut self,
        opt_buf: &'o mut [DhcpOption<'o>],
        secs: u16,
        requested_ip: Option<Ipv4Addr>,
    ) -> (Message<'o>, u32) {
        let xid = self.rng.next_u32();

        let mut message = Message::discover(xid, self.mac, requested_ip, opt_buf);
        message.secs = secs;

        (message, xid)
    }

    /// Requests the address offered in the `xid` transaction by the server at `server_ip`
    pub fn request<'o>(
        &self,
        opt_buf: &'o mut [DhcpOption<'o>],
        xid: u32,
        secs: u16,
        ip: Ipv4Addr,
        server_ip: Ipv4Addr,
    ) -> Message<'o> {
        let mut message = Message::request(xid, self.mac, ip, server_ip, opt_buf);
        message.secs = secs;

        message
    }

    pub fn is_offer(&self, reply: &Message<'_>, xid: u32) -> bool {
        self.is_reply_for_us(reply, xid, MessageType::Offer)
    }

    pub fn is_ack(&self, reply: &Message<'_>, xid: u32) -> bool {
        self.is_reply_for_us(reply, xid, MessageType::Ack)
    }

    pub fn is_nak(&self, reply: &Message<'_>, xid: u32) -> bool {
        self.is_reply_for_us(reply, xid, MessageType::Nak)
    }

    fn is_reply_for_us(&self, reply: &Message<'_>, xid: u32, expected: MessageType) -> bool {
        reply.is_for_us(&self.mac, xid) && reply.message_type() == Some(expected)
    }
}
