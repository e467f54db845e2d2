#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::uninlined_format_args)]
#![allow(unknown_lints)]

use core::net::{Ipv4Addr, SocketAddrV4};

use log::{trace, warn};

pub use bare_dhcp as dhcp;
pub use bare_raw as raw;

use dhcp::Message;
use raw::ip::Ipv4Packet;

/// The local end of a DHCP exchange
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Our address; unspecified until a lease is acquired
    pub ip: Ipv4Addr,
    pub port: u16,
    /// The port replies are sent to when the remote does not name one
    pub server_port: u16,
    pub ttl: u8,
    /// Stamp outbound UDP datagrams with a checksum instead of leaving it at zero
    pub udp_checksum: bool,
}

impl Config {
    pub const DEFAULT_TTL: u8 = 64;

    /// A client configuration for `ip`
    pub const fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            port: dhcp::DEFAULT_CLIENT_PORT,
            server_port: dhcp::DEFAULT_SERVER_PORT,
            ttl: Self::DEFAULT_TTL,
            udp_checksum: false,
        }
    }

    /// A server configuration for `ip`
    pub const fn server(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            port: dhcp::DEFAULT_SERVER_PORT,
            server_port: dhcp::DEFAULT_CLIENT_PORT,
            ttl: Self::DEFAULT_TTL,
            udp_checksum: false,
        }
    }

    pub const fn local(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }

    /// Where to send a message to `ip` by default; broadcast when `ip` is unspecified
    pub const fn remote(&self, ip: Ipv4Addr) -> SocketAddrV4 {
        let ip = if ip.is_unspecified() {
            Ipv4Addr::BROADCAST
        } else {
            ip
        };

        SocketAddrV4::new(ip, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    Raw(raw::Error),
    Dhcp(dhcp::Error),
}

impl From<raw::Error> for Error {
    fn from(value: raw::Error) -> Self {
        Self::Raw(value)
    }
}

impl From<dhcp::Error> for Error {
    fn from(value: dhcp::Error) -> Self {
        Self::Dhcp(value)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Raw(err) => write!(f, "IP/UDP error: {}", err),
            Self::Dhcp(err) => write!(f, "DHCP error: {}", err),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Raw(err) => defmt::write!(f, "IP/UDP error: {}", err),
            Self::Dhcp(err) => defmt::write!(f, "DHCP error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Encodes `message` into the scratch `buf`, wraps it in a UDP datagram from the local
/// end to `remote` and fills `packet` with the resulting IPv4 datagram.
///
/// Returns the datagram bytes, ready for the wire.
pub fn encode<'p, const S: usize>(
    packet: &'p mut Ipv4Packet<S>,
    config: &Config,
    remote: SocketAddrV4,
    message: &Message<'_>,
    buf: &mut [u8],
) -> Result<&'p [u8], Error> {
    let data = message.encode(buf)?;

    let datagram = raw::ip_udp_encode(
        packet,
        config.local(),
        remote,
        config.ttl,
        config.udp_checksum,
        data,
    )?;

    trace!(
        "Encoded {:?} for {}, {} bytes",
        message.message_type(),
        remote,
        datagram.len()
    );

    Ok(datagram)
}

/// Interprets a loaded `packet` as a DHCP message for the local end.
///
/// Returns `Ok(None)` for datagrams which are not UDP or are addressed to another host or
/// port. Otherwise returns the sender and the decoded message.
pub fn decode<'p, const S: usize>(
    packet: &'p Ipv4Packet<S>,
    config: &Config,
) -> Result<Option<(SocketAddrV4, Message<'p>)>, Error> {
    let Some((remote, _, udp)) = raw::ip_udp_decode(packet, config.local())? else {
        return Ok(None);
    };

    let message = Message::decode(udp.payload()).map_err(|err| {
        warn!("Malformed DHCP message from {}: {}", remote, err);
        err
    })?;

    trace!(
        "Decoded {:?} from {}, xid={:08x}",
        message.message_type(),
        remote,
        message.xid
    );

    Ok(Some((remote, message)))
}
