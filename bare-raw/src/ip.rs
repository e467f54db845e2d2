use core::net::Ipv4Addr;

use log::{debug, trace};

use super::bytes::{BytesIn, BytesOut};
use super::checksum;
use super::udp::UdpHeader;
use super::Error;

/// Represents an IPv4 header without options
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ipv4Header {
    /// Version
    pub version: u8,
    /// Header length in 32-bit words
    pub ihl: u8,
    /// Differentiated services code point
    pub dscp: u8,
    /// Explicit congestion notification
    pub ecn: u8,
    /// Total length
    pub total_len: u16,
    /// Identification
    pub id: u16,
    /// Flags (3 bits)
    pub flags: u8,
    /// Fragment offset in 8-byte units (13 bits)
    pub frag_offset: u16,
    /// Time to live
    pub ttl: u8,
    /// Protocol
    pub proto: u8,
    /// Checksum
    pub checksum: u16,
    /// Source address
    pub src: Ipv4Addr,
    /// Dest address
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub const SIZE: usize = 20;
    pub const IHL: u8 = (Self::SIZE / 4) as _;

    pub const FLAG_DF: u8 = 0b010; // Don't fragment flag
    pub const FLAG_MF: u8 = 0b001; // More fragments flag

    pub const MAX_FRAG_OFFSET: u16 = 0x1fff;

    /// Create a new header instance for an option-less IPv4 header
    pub const fn new(src: Ipv4Addr, dst: Ipv4Addr, proto: u8) -> Self {
        Self {
            version: 4,
            ihl: Self::IHL,
            dscp: 0,
            ecn: 0,
            total_len: Self::SIZE as _,
            id: 0,
            flags: 0,
            frag_offset: 0,
            ttl: 64,
            proto,
            checksum: 0,
            src,
            dst,
        }
    }

    /// Decodes the header from a byte slice
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let mut bytes = BytesIn::new(data);

        let vihl = bytes.byte()?;
        let tos = bytes.byte()?;
        let total_len = bytes.be_u16()?;
        let id = bytes.be_u16()?;
        let flags_offset = bytes.be_u16()?;

        Ok(Self {
            version: vihl >> 4,
            ihl: vihl & 0x0f,
            dscp: tos >> 2,
            ecn: tos & 0x03,
            total_len,
            id,
            flags: (flags_offset >> 13) as u8,
            frag_offset: flags_offset & Self::MAX_FRAG_OFFSET,
            ttl: bytes.byte()?,
            proto: bytes.byte()?,
            checksum: bytes.be_u16()?,
            src: bytes.arr()?.into(),
            dst: bytes.arr()?.into(),
        })
    }

    /// Encodes the header into the provided buf slice
    pub fn encode<'o>(&self, buf: &'o mut [u8]) -> Result<&'o [u8], Error> {
        let mut bytes = BytesOut::new(buf);

        bytes
            .byte(((self.version & 0x0f) << 4) | (self.ihl & 0x0f))?
            .byte(((self.dscp & 0x3f) << 2) | (self.ecn & 0x03))?
            .be_u16(self.total_len)?
            .be_u16(self.id)?
            .be_u16(
                ((self.flags as u16 & 0x07) << 13) | (self.frag_offset & Self::MAX_FRAG_OFFSET),
            )?
            .byte(self.ttl)?
            .byte(self.proto)?
            .be_u16(self.checksum)?
            .push(&self.src.octets())?
            .push(&self.dst.octets())?;

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

    /// Computes the checksum over the wire representation of the header,
    /// including whatever value the checksum field currently holds
    pub fn compute_checksum(&self) -> u16 {
        checksum::compute(checksum::words(&self.to_bytes()))
    }

    /// Zeroes the checksum field, then computes and stores the checksum
    pub fn assign_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = self.compute_checksum();
    }

    pub fn is_checksum_valid(&self) -> bool {
        checksum::is_valid(checksum::words(&self.to_bytes()))
    }

    pub fn more_fragments(&self) -> bool {
        self.flags & Self::FLAG_MF != 0
    }
}

/// A fixed-capacity IPv4 datagram of at most `S` bytes.
///
/// The buffer always starts with the encoded header of the last filled or loaded datagram.
/// The payload capacity is `S - 20` rounded down to a multiple of 8, so that payload sizes stay
/// usable as fragment boundaries.
#[derive(Clone, Debug)]
pub struct Ipv4Packet<const S: usize> {
    header: Ipv4Header,
    buf: [u8; S],
    id_counter: u16,
}

impl<const S: usize> Ipv4Packet<S> {
    const BASE_PAYLOAD_SIZE: usize = S - Ipv4Header::SIZE;

    pub const PAYLOAD_SIZE: usize = Self::BASE_PAYLOAD_SIZE - Self::BASE_PAYLOAD_SIZE % 8;

    const SIZE_CHECK: () = assert!(
        Self::PAYLOAD_SIZE >= 8,
        "An IPv4 packet needs room for the header and at least 8 bytes of payload"
    );

    /// Create an empty packet carrying UDP
    pub const fn new() -> Self {
        let () = Self::SIZE_CHECK;

        Self {
            header: Ipv4Header::new(
                Ipv4Addr::UNSPECIFIED,
                Ipv4Addr::UNSPECIFIED,
                UdpHeader::PROTO,
            ),
            buf: [0; S],
            id_counter: 0,
        }
    }

    /// Stamps the header and copies `data` as the payload of a new datagram.
    ///
    /// Fails with `Error::CapacityExceeded` and leaves the packet untouched if `data`
    /// does not fit in `PAYLOAD_SIZE` bytes.
    pub fn fill(
        &mut self,
        ttl: u8,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        data: &[u8],
        more_fragments: bool,
    ) -> Result<&[u8], Error> {
        self.fill_fragment(ttl, src, dst, data, more_fragments, 0)
    }

    /// Same as `fill`, but with a caller-managed fragment offset (in 8-byte units)
    pub fn fill_fragment(
        &mut self,
        ttl: u8,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        data: &[u8],
        more_fragments: bool,
        frag_offset: u16,
    ) -> Result<&[u8], Error> {
        if data.len() > Self::PAYLOAD_SIZE {
            Err(Error::CapacityExceeded)?;
        }

        self.stamp(ttl, src, dst, more_fragments, frag_offset, |buf| {
            buf[..data.len()].copy_from_slice(data);

            Ok(data.len())
        })
    }

    /// Stamps the header of a new datagram whose payload is written in place by `encoder`.
    ///
    /// The encoder gets the whole payload region and returns the number of bytes it used.
    /// If it fails, or claims more than `PAYLOAD_SIZE` bytes, the packet is left holding an
    /// empty datagram so that no partly written payload goes out under an old header.
    pub fn fill_with<F>(
        &mut self,
        ttl: u8,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        more_fragments: bool,
        encoder: F,
    ) -> Result<&[u8], Error>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, Error>,
    {
        self.stamp(ttl, src, dst, more_fragments, 0, encoder)
    }

    fn stamp<F>(
        &mut self,
        ttl: u8,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        more_fragments: bool,
        frag_offset: u16,
        encoder: F,
    ) -> Result<&[u8], Error>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, Error>,
    {
        if frag_offset > Ipv4Header::MAX_FRAG_OFFSET {
            Err(Error::InvalidFormat)?;
        }

        let payload_buf = &mut self.buf[Ipv4Header::SIZE..Ipv4Header::SIZE + Self::PAYLOAD_SIZE];

        let payload_len = match encoder(payload_buf) {
            Ok(len) if len <= Self::PAYLOAD_SIZE => len,
            Ok(_) => {
                self.clear();
                return Err(Error::CapacityExceeded);
            }
            Err(err) => {
                self.clear();
                return Err(err);
            }
        };

        let header = &mut self.header;

        header.ttl = ttl;
        header.src = src;
        header.dst = dst;
        header.total_len = (Ipv4Header::SIZE + payload_len) as _;
        header.id = self.id_counter;
        header.flags = if more_fragments {
            Ipv4Header::FLAG_MF
        } else {
            0
        };
        header.frag_offset = frag_offset;
        header.assign_checksum();

        self.id_counter = self.id_counter.wrapping_add(1);

        self.buf[..Ipv4Header::SIZE].copy_from_slice(&header.to_bytes());

        trace!(
            "IP packet filled, src={}, dst={}, id={}, size={}, checksum={:04x}",
            header.src,
            header.dst,
            header.id,
            header.total_len,
            header.checksum
        );

        Ok(self.as_bytes())
    }

    /// Turns the current datagram into an empty one, keeping addresses and identification
    fn clear(&mut self) {
        let header = &mut self.header;

        header.total_len = Ipv4Header::SIZE as _;
        header.flags = 0;
        header.frag_offset = 0;
        header.assign_checksum();

        self.buf[..Ipv4Header::SIZE].copy_from_slice(&header.to_bytes());

        debug!("IP packet cleared after a failed payload encoding, id={}", header.id);
    }

    /// Loads a datagram delivered by a transport receiver.
    ///
    /// The header is decoded but its checksum is not judged; use `Ipv4Header::is_checksum_valid`.
    pub fn load(&mut self, data: &[u8]) -> Result<&Ipv4Header, Error> {
        let header = Ipv4Header::decode(data)?;
        if header.version != 4 || header.ihl != Ipv4Header::IHL {
            Err(Error::InvalidFormat)?;
        }

        let len = header.total_len as usize;
        if len > S {
            Err(Error::BufferOverflow)?;
        }

        if len < Ipv4Header::SIZE || len > data.len() {
            Err(Error::DataUnderflow)?;
        }

        self.buf[..len].copy_from_slice(&data[..len]);
        self.header = header;

        trace!(
            "IP packet loaded, src={}, dst={}, id={}, size={}, checksum={:04x}",
            self.header.src,
            self.header.dst,
            self.header.id,
            self.header.total_len,
            self.header.checksum
        );

        Ok(&self.header)
    }

    pub fn total_len(&self) -> u16 {
        self.header.total_len
    }

    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    pub fn more_fragments(&self) -> bool {
        self.header.more_fragments()
    }

    pub fn fragment_offset(&self) -> u16 {
        self.header.frag_offset
    }

    /// The payload of the current datagram
    pub fn payload(&self) -> &[u8] {
        &self.buf[Ipv4Header::SIZE..self.header.total_len as usize]
    }

    pub fn header(&self) -> &Ipv4Header {
        &self.header
    }

    /// The header and payload of the current datagram, as they go on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.header.total_len as usize]
    }

    /// Returns `true` if the destination of the current datagram is `addr`
    pub fn is_for_me(&self, addr: Ipv4Addr) -> bool {
        self.header.dst == addr
    }
}

impl<const S: usize> Default for Ipv4Packet<S> {
    fn default() -> Self {
        Self::new()
    }
}
