#![cfg_attr(not(feature = "std"), no_std)]
#![allow(async_fn_in_trait)]
#![allow(clippy::uninlined_format_args)]
#![allow(unknown_lints)]

use core::net::{Ipv4Addr, SocketAddrV4};

use log::{debug, trace};

use self::ip::Ipv4Packet;
use self::udp::{UdpHeader, UdpPacket};

#[cfg(feature = "io")]
pub mod io;

pub mod bytes;
pub mod checksum;
pub mod ip;
pub mod udp;

/// An error type for decoding and encoding IP and UDP packets
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    DataUnderflow,
    BufferOverflow,
    InvalidFormat,
    InvalidChecksum,
    CapacityExceeded,
    OutOfRange,
}

impl From<bytes::Error> for Error {
    fn from(value: bytes::Error) -> Self {
        match value {
            bytes::Error::BufferOverflow => Self::BufferOverflow,
            bytes::Error::DataUnderflow => Self::DataUnderflow,
            bytes::Error::InvalidFormat => Self::InvalidFormat,
        }
    }
}

impl Error {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::DataUnderflow => "Data underflow",
            Self::BufferOverflow => "Buffer overflow",
            Self::InvalidFormat => "Invalid format",
            Self::InvalidChecksum => "Invalid checksum",
            Self::CapacityExceeded => "Payload exceeds packet capacity",
            Self::OutOfRange => "Index out of range",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Wraps `payload` in a UDP datagram and fills `packet` with it.
///
/// The UDP checksum is left at zero unless `udp_checksum` is set.
pub fn ip_udp_encode<'p, const S: usize>(
    packet: &'p mut Ipv4Packet<S>,
    src: SocketAddrV4,
    dst: SocketAddrV4,
    ttl: u8,
    udp_checksum: bool,
    payload: &[u8],
) -> Result<&'p [u8], Error> {
    let mut udp = UdpPacket::new();
    udp.fill(src.port(), dst.port(), payload)?;

    if udp_checksum {
        udp.compute_checksum(*src.ip(), *dst.ip())?;
    }

    if udp.length() as usize > Ipv4Packet::<S>::PAYLOAD_SIZE {
        Err(Error::CapacityExceeded)?;
    }

    packet.fill_with(ttl, *src.ip(), *dst.ip(), false, |buf| udp.write_to(buf))
}

/// Decodes the UDP datagram carried by a loaded `packet`.
///
/// Returns `Ok(None)` when the datagram is not UDP, or is filtered out by `filter_dst`: the
/// destination address has to be the filter's address or the broadcast address, and the
/// destination port has to be the filter's port. A zero filter address or port accepts any.
///
/// A bad IPv4 header checksum or a bad (non-zero) UDP checksum is `Error::InvalidChecksum`.
#[allow(clippy::type_complexity)]
pub fn ip_udp_decode<const S: usize>(
    packet: &Ipv4Packet<S>,
    filter_dst: SocketAddrV4,
) -> Result<Option<(SocketAddrV4, SocketAddrV4, UdpPacket<'_>)>, Error> {
    let hdr = packet.header();

    if !hdr.is_checksum_valid() {
        Err(Error::InvalidChecksum)?;
    }

    if hdr.proto != UdpHeader::PROTO {
        trace!("Dropping non-UDP packet, proto={}", hdr.proto);
        return Ok(None);
    }

    let addr = *filter_dst.ip();
    if !addr.is_unspecified() && !packet.is_for_me(addr) && !packet.is_for_me(Ipv4Addr::BROADCAST)
    {
        debug!("Dropping packet for {}, not for {}", hdr.dst, addr);
        return Ok(None);
    }

    let udp = UdpPacket::decode(packet.payload())?;

    if filter_dst.port() != 0 && udp.destination_port() != filter_dst.port() {
        trace!(
            "Dropping UDP datagram for port {}, not for {}",
            udp.destination_port(),
            filter_dst.port()
        );
        return Ok(None);
    }

    if !udp.is_checksum_valid(hdr.src, hdr.dst) {
        Err(Error::InvalidChecksum)?;
    }

    Ok(Some((
        SocketAddrV4::new(hdr.src, udp.source_port()),
        SocketAddrV4::new(hdr.dst, udp.destination_port()),
        udp,
    )))
}
