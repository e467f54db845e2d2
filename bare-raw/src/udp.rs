use core::net::Ipv4Addr;
use core::ops::Index;

use log::trace;

use super::bytes::{BytesIn, BytesOut};
use super::checksum;
use super::Error;

/// Represents a UDP header
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UdpHeader {
    /// Source port
    pub src: u16,
    /// Destination port
    pub dst: u16,
    /// UDP length, header included
    pub len: u16,
    /// UDP checksum, zero meaning "no checksum"
    pub checksum: u16,
}

impl UdpHeader {
    pub const PROTO: u8 = 17;

    pub const SIZE: usize = 8;

    /// Create a new header instance for an empty datagram
    pub const fn new(src: u16, dst: u16) -> Self {
        Self {
            src,
            dst,
            len: Self::SIZE as _,
            checksum: 0,
        }
    }

    /// Decodes the header from a byte slice
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let mut bytes = BytesIn::new(data);

        Ok(Self {
            src: bytes.be_u16()?,
            dst: bytes.be_u16()?,
            len: bytes.be_u16()?,
            checksum: bytes.be_u16()?,
        })
    }

    /// Encodes the header into the provided buf slice
    pub fn encode<'o>(&self, buf: &'o mut [u8]) -> Result<&'o [u8], Error> {
        let mut bytes = BytesOut::new(buf);

        bytes
            .be_u16(self.src)?
            .be_u16(self.dst)?
            .be_u16(self.len)?
            .be_u16(self.checksum)?;

        let len = bytes.len();

        Ok(&buf[..len])
    }

    /// Returns the wire representation of the header
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];

        // Cannot fail, the buffer is exactly `SIZE` bytes long
        let _ = self.encode(&mut buf);

        buf
    }
}

/// A UDP datagram viewed as a single byte stream of `length()` bytes: the 8 header bytes in
/// network order, followed by a payload the packet borrows rather than owns.
///
/// Indexing past the end of the stream with `[]` panics; `get` is the non-panicking variant.
#[derive(Clone, Debug, Default)]
pub struct UdpPacket<'a> {
    header: UdpHeader,
    header_bytes: [u8; UdpHeader::SIZE],
    payload: &'a [u8],
}

impl<'a> UdpPacket<'a> {
    /// Create an empty packet; every index is out of range until it is filled
    pub const fn new() -> Self {
        Self {
            header: UdpHeader {
                src: 0,
                dst: 0,
                len: 0,
                checksum: 0,
            },
            header_bytes: [0; UdpHeader::SIZE],
            payload: &[],
        }
    }

    /// Sets both ports and the length, clears the checksum and references `data` as the payload
    pub fn fill(&mut self, src: u16, dst: u16, data: &'a [u8]) -> Result<(), Error> {
        let len = UdpHeader::SIZE + data.len();
        if len > u16::MAX as usize {
            Err(Error::BufferOverflow)?;
        }

        self.set_header(UdpHeader {
            src,
            dst,
            len: len as _,
            checksum: 0,
        });
        self.payload = data;

        Ok(())
    }

    /// Replaces the referenced payload, leaving the header as is
    pub fn set_buffer(&mut self, buffer: &'a [u8]) {
        self.payload = buffer;
    }

    /// Decodes a received datagram, borrowing its payload from `packet`
    pub fn decode(packet: &'a [u8]) -> Result<Self, Error> {
        let header = UdpHeader::decode(packet)?;

        let len = header.len as usize;
        if len < UdpHeader::SIZE {
            Err(Error::InvalidFormat)?;
        }

        if packet.len() < len {
            Err(Error::DataUnderflow)?;
        }

        trace!(
            "UDP header decoded, src={}, dst={}, size={}, checksum={:04x}",
            header.src,
            header.dst,
            header.len,
            header.checksum
        );

        let mut udp = Self::new();
        udp.set_header(header);
        udp.payload = &packet[UdpHeader::SIZE..len];

        Ok(udp)
    }

    /// Returns the byte at `index` of the datagram
    pub fn get(&self, index: usize) -> Result<u8, Error> {
        if index < UdpHeader::SIZE {
            Ok(self.header_bytes[index])
        } else if index < self.header.len as usize {
            self.payload
                .get(index - UdpHeader::SIZE)
                .copied()
                .ok_or(Error::OutOfRange)
        } else {
            Err(Error::OutOfRange)
        }
    }

    pub fn length(&self) -> u16 {
        self.header.len
    }

    pub fn source_port(&self) -> u16 {
        self.header.src
    }

    pub fn destination_port(&self) -> u16 {
        self.header.dst
    }

    pub fn header(&self) -> &UdpHeader {
        &self.header
    }

    /// The payload bytes covered by the header's length
    pub fn payload(&self) -> &'a [u8] {
        let len = (self.header.len as usize).saturating_sub(UdpHeader::SIZE);

        &self.payload[..len.min(self.payload.len())]
    }

    /// Iterates over the bytes of the datagram
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.header.len as usize).map_while(|index| self.get(index).ok())
    }

    /// Writes the header and the payload into the provided buffer, returning the written length
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let payload = self.complete_payload()?;

        let mut bytes = BytesOut::new(buf);
        bytes.push(&self.header_bytes)?.push(payload)?;

        Ok(bytes.len())
    }

    /// Computes and stores the RFC 768 checksum, using a pseudo-header with the given addresses
    pub fn compute_checksum(&mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Result<(), Error> {
        let mut header = self.header.clone();
        header.checksum = 0;
        self.set_header(header);

        let sum = self.sum(src, dst)?;

        let mut header = self.header.clone();
        // An all-zero checksum means "none", so a computed zero goes out as all-ones
        header.checksum = match !sum {
            0 => 0xffff,
            checksum => checksum,
        };
        self.set_header(header);

        Ok(())
    }

    /// Returns `true` if the datagram carries no checksum or a correct one
    pub fn is_checksum_valid(&self, src: Ipv4Addr, dst: Ipv4Addr) -> bool {
        self.header.checksum == 0 || matches!(self.sum(src, dst), Ok(0xffff))
    }

    fn sum(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Result<u16, Error> {
        let payload = self.complete_payload()?;

        let mut pseudo = [0; 12];
        BytesOut::new(&mut pseudo)
            .push(&src.octets())?
            .push(&dst.octets())?
            .byte(0)?
            .byte(UdpHeader::PROTO)?
            .be_u16(self.header.len)?;

        Ok(checksum::accumulate(
            checksum::words(&pseudo)
                .chain(checksum::words(&self.header_bytes))
                .chain(checksum::words(payload)),
        ))
    }

    fn complete_payload(&self) -> Result<&'a [u8], Error> {
        let payload = self.payload();

        if UdpHeader::SIZE + payload.len() != self.header.len as usize {
            Err(Error::OutOfRange)
        } else {
            Ok(payload)
        }
    }

    fn set_header(&mut self, header: UdpHeader) {
        self.header_bytes = header.to_bytes();
        self.header = header;
    }
}

impl Index<usize> for UdpPacket<'_> {
    type Output = u8;

    fn index(&self, index: usize) -> &Self::Output {
        let len = self.header.len as usize;

        if index < UdpHeader::SIZE {
            &self.header_bytes[index]
        } else if let Some(byte) = (index < len)
            .then(|| self.payload.get(index - UdpHeader::SIZE))
            .flatten()
        {
            byte
        } else {
            panic!(
                "UDP packet index out of range: the index is {} but the length is {}",
                index, len
            );
        }
    }
}
