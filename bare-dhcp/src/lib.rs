//! A `no_std` and no-alloc codec for the DHCP messages of the Discover/Offer/Request/Ack exchange

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::uninlined_format_args)]
#![allow(unknown_lints)]

pub use core::net::Ipv4Addr;

use log::trace;

use num_enum::TryFromPrimitive;

use bare_raw::bytes::{self, BytesIn, BytesOut};

pub mod client;

pub const DEFAULT_SERVER_PORT: u16 = 67;
pub const DEFAULT_CLIENT_PORT: u16 = 68;

/// The transaction id messages are built with unless the caller picks another one
pub const DEFAULT_XID: u32 = 0x3903_f326;

/// The lease time offered when the server does not configure one
pub const DEFAULT_LEASE_TIME_SECS: u32 = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    DataUnderflow,
    BufferOverflow,
    InvalidPacket,
    InvalidMessageType,
    MissingCookie,
    InvalidHlen,
}

impl From<bytes::Error> for Error {
    fn from(value: bytes::Error) -> Self {
        match value {
            bytes::Error::BufferOverflow => Self::BufferOverflow,
            bytes::Error::DataUnderflow => Self::DataUnderflow,
            bytes::Error::InvalidFormat => Self::InvalidPacket,
        }
    }
}

impl Error {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::DataUnderflow => "Data underflow",
            Self::BufferOverflow => "Buffer overflow",
            Self::InvalidPacket => "Invalid packet",
            Self::InvalidMessageType => "Invalid message type",
            Self::MissingCookie => "Missing cookie",
            Self::InvalidHlen => "Invalid hlen",
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

///
/// DHCP Message Type.
///
/// # Standards
///
/// The semantics of the various DHCP message types are described in RFC 2131 (see Table 2).
/// Their numeric values are described in Section 9.6 of RFC 2132, which begins:
///
/// > This option is used to convey the type of the DHCP message.  The code for this option is 53,
/// > and its length is 1.
///
#[derive(Copy, Clone, PartialEq, Eq, Debug, TryFromPrimitive)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate available servers.
    Discover = 1,

    /// Server to client in response to DHCPDISCOVER with offer of configuration parameters.
    Offer = 2,

    /// Client message to servers either (a) requesting offered parameters from one server and
    /// implicitly declining offers from all others, (b) confirming correctness of previously
    /// allocated address after, e.g., system reboot, or (c) extending the lease on a particular
    /// network address.
    Request = 3,

    /// Client to server indicating network address is already in use.
    Decline = 4,

    /// Server to client with configuration parameters, including committed network address.
    Ack = 5,

    /// Server to client indicating client's notion of network address is incorrect (e.g., client
    /// has moved to new subnet) or client's lease as expired.
    Nak = 6,

    /// Client to server relinquishing network address and cancelling remaining lease.
    Release = 7,

    /// Client to server, asking only for local configuration parameters; client already has
    /// externally configured network address.
    Inform = 8,
}

impl MessageType {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "DHCPDISCOVER",
            Self::Offer => "DHCPOFFER",
            Self::Request => "DHCPREQUEST",
            Self::Decline => "DHCPDECLINE",
            Self::Ack => "DHCPACK",
            Self::Nak => "DHCPNAK",
            Self::Release => "DHCPRELEASE",
            Self::Inform => "DHCPINFORM",
        }
    }
}

impl core::fmt::Display for MessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.as_str().fmt(f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MessageType {
    fn format(&self, f: defmt::Formatter<'_>) {
        self.as_str().format(f)
    }
}

/// DHCP Message Structure
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message<'a> {
    pub reply: bool,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub broadcast: bool,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub options: Options<'a>,
}

impl<'a> Message<'a> {
    const COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

    const BOOT_REQUEST: u8 = 1; // From Client
    const BOOT_REPLY: u8 = 2; // From Server

    const HTYPE_ETHERNET: u8 = 1;
    const HLEN_ETHERNET: u8 = 6;

    const BROADCAST: u16 = 0x8000;

    const SERVER_NAME_AND_FILE_NAME: usize = 64 + 128;

    /// Offset of the magic cookie; the options follow it
    pub const COOKIE_OFFSET: usize = 236;

    /// BOOTP relays may drop anything shorter (RFC 1542, section 2.1)
    pub const MIN_SIZE: usize = 300;

    pub fn new_request(
        mac: [u8; 6],
        xid: u32,
        secs: u16,
        our_ip: Option<Ipv4Addr>,
        broadcast: bool,
        options: Options<'a>,
    ) -> Self {
        let mut chaddr = [0; 16];
        chaddr[..6].copy_from_slice(&mac);

        Self {
            reply: false,
            hops: 0,
            xid,
            secs,
            broadcast,
            ciaddr: our_ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            options,
        }
    }

    pub fn new_reply<'b>(&self, ip: Option<Ipv4Addr>, options: Options<'b>) -> Message<'b> {
        let ciaddr = if ip.is_some() && self.message_type() == Some(MessageType::Request) {
            self.ciaddr
        } else {
            Ipv4Addr::UNSPECIFIED
        };

        Message {
            reply: true,
            hops: 0,
            xid: self.xid,
            secs: 0,
            broadcast: self.broadcast,
            ciaddr,
            yiaddr: ip.unwrap_or(Ipv4Addr::UNSPECIFIED),
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: self.giaddr,
            chaddr: self.chaddr,
            options,
        }
    }

    /// A DHCPDISCOVER, optionally suggesting the address the client would like to get
    pub fn discover(
        xid: u32,
        mac: [u8; 6],
        requested_ip: Option<Ipv4Addr>,
        buf: &'a mut [DhcpOption<'a>],
    ) -> Self {
        Self::new_request(mac, xid, 0, None, false, Options::discover(requested_ip, buf))
    }

    /// A DHCPREQUEST for `ip`, as offered by the server identified by `server_ip`
    pub fn request(
        xid: u32,
        mac: [u8; 6],
        ip: Ipv4Addr,
        server_ip: Ipv4Addr,
        buf: &'a mut [DhcpOption<'a>],
    ) -> Self {
        Self::new_request(mac, xid, 0, None, false, Options::request(ip, server_ip, buf))
    }

    /// A DHCPOFFER of `ip`, replying to this message
    pub fn offer<'b>(
        &self,
        ip: Ipv4Addr,
        server: &ServerOptions<'b>,
        buf: &'b mut [DhcpOption<'b>],
    ) -> Message<'b> {
        self.new_reply(Some(ip), Options::offer(server, buf))
    }

    /// A DHCPACK of `ip`, replying to this message
    pub fn ack<'b>(
        &self,
        ip: Ipv4Addr,
        server: &ServerOptions<'b>,
        buf: &'b mut [DhcpOption<'b>],
    ) -> Message<'b> {
        self.new_reply(Some(ip), Options::ack(server, buf))
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.options.iter().find_map(|option| {
            if let DhcpOption::MessageType(mt) = option {
                Some(mt)
            } else {
                None
            }
        })
    }

    pub fn is_for_us(&self, mac: &[u8; 6], xid: u32) -> bool {
        const MAC_TRAILING_ZEROS: [u8; 10] = [0; 10];

        self.chaddr[0..6] == *mac
            && self.chaddr[6..16] == MAC_TRAILING_ZEROS
            && self.xid == xid
            && self.reply
    }

    /// Parses the message from a byte slice
    pub fn decode(data: &'a [u8]) -> Result<Self, Error> {
        let mut message = Self::decode_fixed(data)?;

        message.options = Options(OptionsInner::decode(message.options.bytes())?);

        trace!(
            "DHCP message decoded, xid={:08x}, reply={}, options={:?}",
            message.xid,
            message.reply,
            message.options
        );

        Ok(message)
    }

    /// Parses everything up to and including the magic cookie.
    /// The options are left as they are, without validating them.
    fn decode_fixed(data: &'a [u8]) -> Result<Self, Error> {
        let mut bytes = BytesIn::new(data);

        Ok(Self {
            reply: {
                let reply = bytes.byte()? == Self::BOOT_REPLY;
                let _htype = bytes.byte()?; // Hardware address type; 1 = 10Mb Ethernet
                let hlen = bytes.byte()?;

                if hlen != Self::HLEN_ETHERNET {
                    Err(Error::InvalidHlen)?;
                }

                reply
            },
            hops: bytes.byte()?,
            xid: bytes.be_u32()?,
            secs: bytes.be_u16()?,
            broadcast: bytes.be_u16()? & Self::BROADCAST != 0,
            ciaddr: bytes.arr()?.into(),
            yiaddr: bytes.arr()?.into(),
            siaddr: bytes.arr()?.into(),
            giaddr: bytes.arr()?.into(),
            chaddr: bytes.arr()?,
            options: {
                bytes.skip(Self::SERVER_NAME_AND_FILE_NAME)?;

                if bytes.arr()? != Self::COOKIE {
                    Err(Error::MissingCookie)?;
                }

                Options(OptionsInner::ByteSlice(bytes.remaining()))
            },
        })
    }

    /// Encodes the message into the provided buf slice
    pub fn encode<'o>(&self, buf: &'o mut [u8]) -> Result<&'o [u8], Error> {
        let mut bytes = BytesOut::new(buf);

        bytes
            .byte(if self.reply {
                Self::BOOT_REPLY
            } else {
                Self::BOOT_REQUEST
            })?
            .byte(Self::HTYPE_ETHERNET)?
            .byte(Self::HLEN_ETHERNET)?
            .byte(self.hops)?
            .be_u32(self.xid)?
            .be_u16(self.secs)?
            .be_u16(if self.broadcast { Self::BROADCAST } else { 0 })?
            .push(&self.ciaddr.octets())?
            .push(&self.yiaddr.octets())?
            .push(&self.siaddr.octets())?
            .push(&self.giaddr.octets())?
            .push(&self.chaddr)?
            .zeroes(Self::SERVER_NAME_AND_FILE_NAME)?
            .push(&Self::COOKIE)?;

        self.options.0.encode(&mut bytes)?;

        bytes.byte(END)?;

        if bytes.len() < Self::MIN_SIZE {
            let padding = Self::MIN_SIZE - bytes.len();
            bytes.zeroes(padding)?;
        }

        let len = bytes.len();

        trace!("DHCP message encoded, xid={:08x}, size={}", self.xid, len);

        Ok(&buf[..len])
    }
}

/// The part every DHCP message shares: the fixed BOOTP fields and the message type.
///
/// Decoding it classifies an inbound message before it is interpreted as a particular kind.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaseMessage {
    pub reply: bool,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub broadcast: bool,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub message_type: MessageType,
}

impl BaseMessage {
    /// The fixed fields, the magic cookie and a leading message type option
    pub const SIZE: usize = Message::COOKIE_OFFSET + 4 + 3;

    /// Parses the fixed part of a message and finds its message type.
    ///
    /// Options are scanned only as far as the message type option; whatever follows it is
    /// not looked at.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let message = Message::decode_fixed(data)?;

        let mut bytes = BytesIn::new(message.options.bytes());

        let message_type = loop {
            match DhcpOption::decode(&mut bytes)? {
                Some(DhcpOption::MessageType(mt)) => break mt,
                Some(_) => continue,
                None => Err(Error::InvalidMessageType)?,
            }
        };

        Ok(Self {
            reply: message.reply,
            hops: message.hops,
            xid: message.xid,
            secs: message.secs,
            broadcast: message.broadcast,
            ciaddr: message.ciaddr,
            yiaddr: message.yiaddr,
            siaddr: message.siaddr,
            giaddr: message.giaddr,
            chaddr: message.chaddr,
            message_type,
        })
    }
}

/// The network configuration a server hands out with its offers and acks
#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServerOptions<'a> {
    pub ip: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub gateways: &'a [Ipv4Addr],
    pub dns: &'a [Ipv4Addr],
    pub lease_time_secs: u32,
}

impl<'a> ServerOptions<'a> {
    pub const fn new(
        ip: Ipv4Addr,
        subnet: Ipv4Addr,
        gateways: &'a [Ipv4Addr],
        dns: &'a [Ipv4Addr],
    ) -> Self {
        Self {
            ip,
            subnet,
            gateways,
            dns,
            lease_time_secs: DEFAULT_LEASE_TIME_SECS,
        }
    }
}

/// The network configuration a client got from an offer or an ack
#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Settings {
    pub ip: Ipv4Addr,
    pub server_ip: Option<Ipv4Addr>,
    pub lease_time_secs: Option<u32>,
    pub gateway: Option<Ipv4Addr>,
    pub subnet: Option<Ipv4Addr>,
    pub dns1: Option<Ipv4Addr>,
    pub dns2: Option<Ipv4Addr>,
}

impl Settings {
    pub fn new(message: &Message<'_>) -> Self {
        Self {
            ip: message.yiaddr,
            server_ip: message.options.iter().find_map(|option| {
                if let DhcpOption::ServerIdentifier(ip) = option {
                    Some(ip)
                } else {
                    None
                }
            }),
            lease_time_secs: message.options.iter().find_map(|option| {
                if let DhcpOption::IpAddressLeaseTime(lease_time_secs) = option {
                    Some(lease_time_secs)
                } else {
                    None
                }
            }),
            gateway: message.options.iter().find_map(|option| {
                if let DhcpOption::Router(ips) = option {
                    ips.iter().next()
                } else {
                    None
                }
            }),
            subnet: message.options.iter().find_map(|option| {
                if let DhcpOption::SubnetMask(subnet) = option {
                    Some(subnet)
                } else {
                    None
                }
            }),
            dns1: message.options.iter().find_map(|option| {
                if let DhcpOption::DomainNameServer(ips) = option {
                    ips.iter().next()
                } else {
                    None
                }
            }),
            dns2: message.options.iter().find_map(|option| {
                if let DhcpOption::DomainNameServer(ips) = option {
                    ips.iter().nth(1)
                } else {
                    None
                }
            }),
        }
    }
}

/// The options of a message, in wire order
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Options<'a>(OptionsInner<'a>);

impl<'a> Options<'a> {
    /// Subnet mask, router, domain name and DNS servers
    const DISCOVER_PARAMS: &'static [u8] = &[
        DhcpOption::CODE_SUBNET,
        DhcpOption::CODE_ROUTER,
        DhcpOption::CODE_DOMAIN_NAME,
        DhcpOption::CODE_DNS,
    ];

    pub const fn new(options: &'a [DhcpOption<'a>]) -> Self {
        Self(OptionsInner::DataSlice(options))
    }

    /// A scratch buffer large enough for every preset
    #[inline(always)]
    pub const fn buf() -> [DhcpOption<'a>; 8] {
        [DhcpOption::Unrecognized(PAD, &[]); 8]
    }

    /// The options of a DHCPDISCOVER.
    ///
    /// Panics if `buf` has fewer than 2 slots, or 3 when `requested_ip` is given.
    pub fn discover(requested_ip: Option<Ipv4Addr>, buf: &'a mut [DhcpOption<'a>]) -> Self {
        buf[0] = DhcpOption::MessageType(MessageType::Discover);

        let mut offset = 1;

        if let Some(requested_ip) = requested_ip {
            buf[offset] = DhcpOption::RequestedIpAddress(requested_ip);
            offset += 1;
        }

        buf[offset] = DhcpOption::ParameterRequestList(Self::DISCOVER_PARAMS);
        offset += 1;

        Self::new(&buf[..offset])
    }

    /// The options of a DHCPREQUEST. Panics if `buf` has fewer than 3 slots.
    pub fn request(ip: Ipv4Addr, server_ip: Ipv4Addr, buf: &'a mut [DhcpOption<'a>]) -> Self {
        buf[0] = DhcpOption::MessageType(MessageType::Request);
        buf[1] = DhcpOption::RequestedIpAddress(ip);
        buf[2] = DhcpOption::ServerIdentifier(server_ip);

        Self::new(&buf[..3])
    }

    /// The options of a DHCPOFFER.
    ///
    /// Panics if `buf` has fewer than 4 slots, plus one for each non-empty list of gateways
    /// and DNS servers.
    pub fn offer(server: &ServerOptions<'a>, buf: &'a mut [DhcpOption<'a>]) -> Self {
        Self::reply(MessageType::Offer, server, buf)
    }

    /// The options of a DHCPACK, with the same `buf` requirements as `offer`.
    pub fn ack(server: &ServerOptions<'a>, buf: &'a mut [DhcpOption<'a>]) -> Self {
        Self::reply(MessageType::Ack, server, buf)
    }

    fn reply(mt: MessageType, server: &ServerOptions<'a>, buf: &'a mut [DhcpOption<'a>]) -> Self {
        buf[0] = DhcpOption::MessageType(mt);
        buf[1] = DhcpOption::SubnetMask(server.subnet);

        let mut offset = 2;

        if !server.gateways.is_empty() {
            buf[offset] = DhcpOption::Router(Ipv4Addrs::new(server.gateways));
            offset += 1;
        }

        buf[offset] = DhcpOption::IpAddressLeaseTime(server.lease_time_secs);
        buf[offset + 1] = DhcpOption::ServerIdentifier(server.ip);
        offset += 2;

        if !server.dns.is_empty() {
            buf[offset] = DhcpOption::DomainNameServer(Ipv4Addrs::new(server.dns));
            offset += 1;
        }

        Self::new(&buf[..offset])
    }

    pub fn iter(&self) -> impl Iterator<Item = DhcpOption<'a>> + 'a {
        self.0.iter()
    }

    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.iter().find_map(|option| {
            if let DhcpOption::RequestedIpAddress(ip) = option {
                Some(ip)
            } else {
                None
            }
        })
    }

    fn bytes(&self) -> &'a [u8] {
        match self.0 {
            OptionsInner::ByteSlice(data) => data,
            OptionsInner::DataSlice(_) => &[],
        }
    }
}

impl core::fmt::Debug for Options<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum OptionsInner<'a> {
    ByteSlice(&'a [u8]),
    DataSlice(&'a [DhcpOption<'a>]),
}

impl<'a> OptionsInner<'a> {
    /// Validates the options and cuts them at the end option
    fn decode(data: &'a [u8]) -> Result<Self, Error> {
        let mut bytes = BytesIn::new(data);

        while DhcpOption::decode(&mut bytes)?.is_some() {}

        Ok(Self::ByteSlice(&data[..bytes.offset()]))
    }

    fn encode(&self, buf: &mut BytesOut) -> Result<(), Error> {
        for option in self.iter() {
            option.encode(buf)?;
        }

        Ok(())
    }

    fn iter(&self) -> impl Iterator<Item = DhcpOption<'a>> + 'a {
        struct ByteSliceDhcpOptions<'a>(BytesIn<'a>);

        impl<'a> Iterator for ByteSliceDhcpOptions<'a> {
            type Item = DhcpOption<'a>;

            fn next(&mut self) -> Option<Self::Item> {
                DhcpOption::decode(&mut self.0).ok().flatten()
            }
        }

        match *self {
            Self::ByteSlice(data) => {
                EitherIterator::First(ByteSliceDhcpOptions(BytesIn::new(data)))
            }
            Self::DataSlice(data) => EitherIterator::Second(data.iter().cloned()),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhcpOption<'a> {
    /// 53: DHCP Message Type
    MessageType(MessageType),
    /// 54: Server Identifier
    ServerIdentifier(Ipv4Addr),
    /// 55: Parameter Request List
    ParameterRequestList(&'a [u8]),
    /// 50: Requested IP Address
    RequestedIpAddress(Ipv4Addr),
    /// 3: Router Option
    Router(Ipv4Addrs<'a>),
    /// 6: Domain Name Server Option
    DomainNameServer(Ipv4Addrs<'a>),
    /// 51: IP Address Lease Time
    IpAddressLeaseTime(u32),
    /// 1: Subnet Mask
    SubnetMask(Ipv4Addr),
    // Other (unrecognized)
    Unrecognized(u8, &'a [u8]),
}

impl DhcpOption<'_> {
    pub const CODE_ROUTER: u8 = DhcpOption::Router(Ipv4Addrs::new(&[])).code();
    pub const CODE_DNS: u8 = DhcpOption::DomainNameServer(Ipv4Addrs::new(&[])).code();
    pub const CODE_SUBNET: u8 = DhcpOption::SubnetMask(Ipv4Addr::new(0, 0, 0, 0)).code();
    pub const CODE_DOMAIN_NAME: u8 = DOMAIN_NAME;

    /// Decodes the next option, skipping padding.
    /// Returns `None` at the end option, or when the data runs out.
    fn decode<'o>(bytes: &mut BytesIn<'o>) -> Result<Option<DhcpOption<'o>>, Error> {
        let code = loop {
            if bytes.is_empty() {
                return Ok(None);
            }

            match bytes.byte()? {
                PAD => continue,
                code => break code,
            }
        };

        if code == END {
            return Ok(None);
        }

        let len = bytes.byte()? as usize;
        let mut bytes = BytesIn::new(bytes.slice(len)?);

        let option = match code {
            DHCP_MESSAGE_TYPE => DhcpOption::MessageType(
                TryFromPrimitive::try_from_primitive(bytes.remaining_byte()?)
                    .map_err(|_| Error::InvalidMessageType)?,
            ),
            SERVER_IDENTIFIER => {
                DhcpOption::ServerIdentifier(Ipv4Addr::from(bytes.remaining_arr()?))
            }
            PARAMETER_REQUEST_LIST => DhcpOption::ParameterRequestList(bytes.remaining()),
            REQUESTED_IP_ADDRESS => {
                DhcpOption::RequestedIpAddress(Ipv4Addr::from(bytes.remaining_arr()?))
            }
            ROUTER => DhcpOption::Router(Ipv4Addrs::decode(bytes.remaining())?),
            DOMAIN_NAME_SERVER => {
                DhcpOption::DomainNameServer(Ipv4Addrs::decode(bytes.remaining())?)
            }
            IP_ADDRESS_LEASE_TIME => {
                DhcpOption::IpAddressLeaseTime(u32::from_be_bytes(bytes.remaining_arr()?))
            }
            SUBNET_MASK => DhcpOption::SubnetMask(Ipv4Addr::from(bytes.remaining_arr()?)),
            _ => DhcpOption::Unrecognized(code, bytes.remaining()),
        };

        Ok(Some(option))
    }

    fn encode(&self, out: &mut BytesOut) -> Result<(), Error> {
        out.byte(self.code())?;

        let mut len = 0;
        self.data(|data| {
            len += data.len();
            Ok(())
        })?;

        if len > u8::MAX as usize {
            Err(Error::BufferOverflow)?;
        }

        out.byte(len as _)?;

        self.data(|data| {
            out.push(data)?;

            Ok(())
        })
    }

    pub const fn code(&self) -> u8 {
        match self {
            Self::MessageType(_) => DHCP_MESSAGE_TYPE,
            Self::ServerIdentifier(_) => SERVER_IDENTIFIER,
            Self::ParameterRequestList(_) => PARAMETER_REQUEST_LIST,
            Self::RequestedIpAddress(_) => REQUESTED_IP_ADDRESS,
            Self::Router(_) => ROUTER,
            Self::DomainNameServer(_) => DOMAIN_NAME_SERVER,
            Self::IpAddressLeaseTime(_) => IP_ADDRESS_LEASE_TIME,
            Self::SubnetMask(_) => SUBNET_MASK,
            Self::Unrecognized(code, _) => *code,
        }
    }

    fn data(&self, mut f: impl FnMut(&[u8]) -> Result<(), Error>) -> Result<(), Error> {
        match self {
            Self::MessageType(mtype) => f(&[*mtype as _]),
            Self::ServerIdentifier(addr) => f(&addr.octets()),
            Self::ParameterRequestList(prl) => f(prl),
            Self::RequestedIpAddress(addr) => f(&addr.octets()),
            Self::Router(addrs) | Self::DomainNameServer(addrs) => {
                for addr in addrs.iter() {
                    f(&addr.octets())?;
                }

                Ok(())
            }
            Self::IpAddressLeaseTime(secs) => f(&secs.to_be_bytes()),
            Self::SubnetMask(mask) => f(&mask.octets()),
            Self::Unrecognized(_, data) => f(data),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ipv4Addrs<'a>(Ipv4AddrsInner<'a>);

impl<'a> Ipv4Addrs<'a> {
    pub const fn new(addrs: &'a [Ipv4Addr]) -> Self {
        Self(Ipv4AddrsInner::DataSlice(addrs))
    }

    fn decode(data: &'a [u8]) -> Result<Self, Error> {
        if data.is_empty() || data.len() % 4 != 0 {
            Err(Error::InvalidPacket)
        } else {
            Ok(Self(Ipv4AddrsInner::ByteSlice(data)))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + 'a {
        self.0.iter()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Ipv4AddrsInner<'a> {
    ByteSlice(&'a [u8]),
    DataSlice(&'a [Ipv4Addr]),
}

impl<'a> Ipv4AddrsInner<'a> {
    fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + 'a {
        match *self {
            Self::ByteSlice(data) => EitherIterator::First(
                data.chunks_exact(4)
                    .map(|octets| Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3])),
            ),
            Self::DataSlice(data) => EitherIterator::Second(data.iter().cloned()),
        }
    }
}

enum EitherIterator<F, S> {
    First(F),
    Second(S),
}

impl<F, S> Iterator for EitherIterator<F, S>
where
    F: Iterator,
    S: Iterator<Item = F::Item>,
{
    type Item = F::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::First(iter) => iter.next(),
            Self::Second(iter) => iter.next(),
        }
    }
}

const PAD: u8 = 0;
const END: u8 = 255;

// DHCP Options
const SUBNET_MASK: u8 = 1;
const ROUTER: u8 = 3;
const DOMAIN_NAME_SERVER: u8 = 6;
const DOMAIN_NAME: u8 = 15;

// DHCP Extensions
const REQUESTED_IP_ADDRESS: u8 = 50;
const IP_ADDRESS_LEASE_TIME: u8 = 51;
const DHCP_MESSAGE_TYPE: u8 = 53;
const SERVER_IDENTIFIER: u8 = 54;
const PARAMETER_REQUEST_LIST: u8 = 55;

#[cfg(test)]
mod test {
    use super::*;

    const MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x12, 0x34, 0x56];
    const SERVER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);
    const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 112);
    const SUBNET: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

    const GATEWAYS: &[Ipv4Addr] = &[SERVER_IP];
    const DNS: &[Ipv4Addr] = &[Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)];

    /// A request carrying the raw `options` after the cookie
    fn with_options(options: &[u8], buf: &mut [u8; 576]) -> usize {
        let mut opt_buf = Options::buf();
        let request = Message::request(DEFAULT_XID, MAC, CLIENT_IP, SERVER_IP, &mut opt_buf);
        request.encode(buf).unwrap();

        let end = Message::COOKIE_OFFSET + 4 + options.len();
        buf[Message::COOKIE_OFFSET + 4..end].copy_from_slice(options);

        end
    }

    #[test]
    fn test_discover_layout() {
        let mut opt_buf = Options::buf();
        let discover = Message::discover(DEFAULT_XID, MAC, None, &mut opt_buf);

        let mut buf = [0xaa; 576];
        let data = discover.encode(&mut buf).unwrap();

        assert_eq!(data.len(), Message::MIN_SIZE);
        assert_eq!(&data[..4], &[1, 1, 6, 0]);
        assert_eq!(&data[4..8], &[0x39, 0x03, 0xf3, 0x26]);
        assert_eq!(&data[8..28], &[0; 20]);
        assert_eq!(&data[28..34], &MAC);
        assert!(data[34..236].iter().all(|b| *b == 0));
        assert_eq!(&data[236..240], &[0x63, 0x82, 0x53, 0x63]);
        assert_eq!(&data[240..243], &[53, 1, 1]);
        assert_eq!(&data[243..249], &[55, 4, 1, 3, 15, 6]);
        assert_eq!(data[249], 255);
        assert!(data[250..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_discover_requested_ip() {
        let mut opt_buf = Options::buf();
        let discover = Message::discover(7, MAC, Some(CLIENT_IP), &mut opt_buf);

        assert_eq!(discover.message_type(), Some(MessageType::Discover));
        assert_eq!(discover.options.requested_ip(), Some(CLIENT_IP));

        let mut buf = [0; 576];
        let data = discover.encode(&mut buf).unwrap();

        assert_eq!(&data[240..249], &[53, 1, 1, 50, 4, 192, 168, 0, 112]);
    }

    #[test]
    fn test_request() {
        let mut opt_buf = Options::buf();
        let request = Message::request(DEFAULT_XID, MAC, CLIENT_IP, SERVER_IP, &mut opt_buf);

        let mut buf = [0; 576];
        let data = request.encode(&mut buf).unwrap();

        assert_eq!(
            &data[240..256],
            &[53, 1, 3, 50, 4, 192, 168, 0, 112, 54, 4, 192, 168, 0, 1, 255]
        );

        let decoded = Message::decode(data).unwrap();

        assert!(!decoded.reply);
        assert_eq!(decoded.message_type(), Some(MessageType::Request));
        assert_eq!(decoded.options.requested_ip(), Some(CLIENT_IP));
    }

    #[test]
    fn test_offer() {
        let mut opt_buf = Options::buf();
        let discover = Message::discover(DEFAULT_XID, MAC, None, &mut opt_buf);

        let server = ServerOptions::new(SERVER_IP, SUBNET, GATEWAYS, DNS);

        let mut reply_buf = Options::buf();
        let offer = discover.offer(CLIENT_IP, &server, &mut reply_buf);

        let mut buf = [0; 576];
        let data = offer.encode(&mut buf).unwrap();

        assert_eq!(data.len(), Message::MIN_SIZE);
        assert_eq!(data[0], 2);
        assert_eq!(&data[4..8], &[0x39, 0x03, 0xf3, 0x26]);
        assert_eq!(&data[16..20], &[192, 168, 0, 112]);
        assert_eq!(
            &data[240..278],
            &[
                53, 1, 2, // message type
                1, 4, 255, 255, 255, 0, // subnet
                3, 4, 192, 168, 0, 1, // router
                51, 4, 0, 0, 0, 16, // lease time
                54, 4, 192, 168, 0, 1, // server id
                6, 8, 8, 8, 8, 8, 1, 1, 1, 1, // dns
                255,
            ]
        );

        let decoded = Message::decode(data).unwrap();

        assert!(decoded.reply);
        assert!(decoded.is_for_us(&MAC, DEFAULT_XID));
        assert!(!decoded.is_for_us(&MAC, DEFAULT_XID + 1));
        assert_eq!(decoded.message_type(), Some(MessageType::Offer));

        let settings = Settings::new(&decoded);

        assert_eq!(settings.ip, CLIENT_IP);
        assert_eq!(settings.server_ip, Some(SERVER_IP));
        assert_eq!(settings.lease_time_secs, Some(DEFAULT_LEASE_TIME_SECS));
        assert_eq!(settings.gateway, Some(SERVER_IP));
        assert_eq!(settings.subnet, Some(SUBNET));
        assert_eq!(settings.dns1, Some(DNS[0]));
        assert_eq!(settings.dns2, Some(DNS[1]));
    }

    #[test]
    fn test_ack_without_router_and_dns() {
        let mut opt_buf = Options::buf();
        let request = Message::request(DEFAULT_XID, MAC, CLIENT_IP, SERVER_IP, &mut opt_buf);

        let mut server = ServerOptions::new(SERVER_IP, SUBNET, &[], &[]);
        server.lease_time_secs = 3600;

        let mut reply_buf = Options::buf();
        let ack = request.ack(CLIENT_IP, &server, &mut reply_buf);

        let mut buf = [0; 576];
        let data = ack.encode(&mut buf).unwrap();

        assert_eq!(
            &data[240..262],
            &[53, 1, 5, 1, 4, 255, 255, 255, 0, 51, 4, 0, 0, 14, 16, 54, 4, 192, 168, 0, 1, 255]
        );

        let settings = Settings::new(&Message::decode(data).unwrap());

        assert_eq!(settings.ip, CLIENT_IP);
        assert_eq!(settings.lease_time_secs, Some(3600));
        assert_eq!(settings.gateway, None);
        assert_eq!(settings.dns1, None);
    }

    #[test]
    fn test_encode_overflow() {
        let mut opt_buf = Options::buf();
        let discover = Message::discover(DEFAULT_XID, MAC, None, &mut opt_buf);

        let mut buf = [0; Message::MIN_SIZE - 1];

        assert_eq!(discover.encode(&mut buf), Err(Error::BufferOverflow));
    }

    #[test]
    fn test_decode_options() {
        let mut buf = [0; 576];
        let len = with_options(
            &[
                0, 0, 53, 1, 3, 99, 2, 0xab, 0xcd, 50, 4, 10, 0, 0, 2, 255, 0xde, 0xad,
            ],
            &mut buf,
        );

        let message = Message::decode(&buf[..len]).unwrap();

        let mut options = message.options.iter();
        assert_eq!(
            options.next(),
            Some(DhcpOption::MessageType(MessageType::Request))
        );
        assert_eq!(
            options.next(),
            Some(DhcpOption::Unrecognized(99, &[0xab, 0xcd]))
        );
        assert_eq!(
            options.next(),
            Some(DhcpOption::RequestedIpAddress(Ipv4Addr::new(10, 0, 0, 2)))
        );
        assert_eq!(options.next(), None);
    }

    #[test]
    fn test_unrecognized_options_kept() {
        let options = [
            12, 4, b'h', b'o', b's', b't', // host name
            61, 7, 1, 0x02, 0x00, 0x00, 0x12, 0x34, 0x56, // client id
            53, 1, 3, 255,
        ];

        let mut buf = [0; 576];
        let len = with_options(&options, &mut buf);

        let message = Message::decode(&buf[..len]).unwrap();

        let mut iter = message.options.iter();
        assert_eq!(iter.next(), Some(DhcpOption::Unrecognized(12, b"host")));
        assert_eq!(
            iter.next(),
            Some(DhcpOption::Unrecognized(61, &[1, 0x02, 0x00, 0x00, 0x12, 0x34, 0x56]))
        );
        assert_eq!(message.message_type(), Some(MessageType::Request));

        let mut out = [0; 576];
        let data = message.encode(&mut out).unwrap();

        assert_eq!(&data[240..240 + options.len()], &options);
    }

    #[test]
    fn test_presets_minimum_buffers() {
        let mut buf = [DhcpOption::Unrecognized(PAD, &[]); 2];
        assert_eq!(Options::discover(None, &mut buf).iter().count(), 2);

        let mut buf = [DhcpOption::Unrecognized(PAD, &[]); 3];
        assert_eq!(
            Options::discover(Some(CLIENT_IP), &mut buf).iter().count(),
            3
        );

        let mut buf = [DhcpOption::Unrecognized(PAD, &[]); 3];
        assert_eq!(
            Options::request(CLIENT_IP, SERVER_IP, &mut buf).iter().count(),
            3
        );

        let server = ServerOptions::new(SERVER_IP, SUBNET, &[], &[]);

        let mut buf = [DhcpOption::Unrecognized(PAD, &[]); 4];
        assert_eq!(Options::offer(&server, &mut buf).iter().count(), 4);

        let server = ServerOptions::new(SERVER_IP, SUBNET, GATEWAYS, DNS);

        let mut buf = [DhcpOption::Unrecognized(PAD, &[]); 6];
        assert_eq!(Options::ack(&server, &mut buf).iter().count(), 6);
    }

    #[test]
    #[should_panic]
    fn test_preset_buffer_too_small() {
        let server = ServerOptions::new(SERVER_IP, SUBNET, GATEWAYS, DNS);

        let mut buf = [DhcpOption::Unrecognized(PAD, &[]); 5];
        Options::offer(&server, &mut buf);
    }

    #[test]
    fn test_decode_without_end() {
        let mut buf = [0; 576];
        let len = with_options(&[53, 1, 8], &mut buf);

        let message = Message::decode(&buf[..len]).unwrap();

        assert_eq!(message.message_type(), Some(MessageType::Inform));
        assert_eq!(message.options.iter().count(), 1);
    }

    #[test]
    fn test_decode_malformed() {
        let mut buf = [0; 576];

        let len = with_options(&[53, 4, 1], &mut buf);
        assert_eq!(Message::decode(&buf[..len]), Err(Error::DataUnderflow));

        let len = with_options(&[53, 1, 9, 255], &mut buf);
        assert_eq!(Message::decode(&buf[..len]), Err(Error::InvalidMessageType));

        let len = with_options(&[51, 3, 0, 0, 1, 255], &mut buf);
        assert_eq!(Message::decode(&buf[..len]), Err(Error::InvalidPacket));

        let len = with_options(&[255], &mut buf);

        buf[236] = 0;
        assert_eq!(Message::decode(&buf[..len]), Err(Error::MissingCookie));

        buf[2] = 16;
        assert_eq!(Message::decode(&buf[..len]), Err(Error::InvalidHlen));

        assert_eq!(Message::decode(&buf[..100]), Err(Error::InvalidHlen));
        assert_eq!(Message::decode(&buf[..2]), Err(Error::DataUnderflow));
    }

    #[test]
    fn test_base_message() {
        let mut opt_buf = Options::buf();
        let discover = Message::discover(DEFAULT_XID, MAC, None, &mut opt_buf);

        let mut reply_buf = Options::buf();
        let offer = discover.offer(
            CLIENT_IP,
            &ServerOptions::new(SERVER_IP, SUBNET, GATEWAYS, DNS),
            &mut reply_buf,
        );

        let mut buf = [0; 576];
        let data = offer.encode(&mut buf).unwrap();

        let base = BaseMessage::decode(data).unwrap();

        assert!(base.reply);
        assert_eq!(base.xid, DEFAULT_XID);
        assert_eq!(base.yiaddr, CLIENT_IP);
        assert_eq!(&base.chaddr[..6], &MAC);
        assert_eq!(base.message_type, MessageType::Offer);

        assert!(BaseMessage::decode(&data[..BaseMessage::SIZE]).is_ok());
        assert_eq!(
            BaseMessage::decode(&data[..BaseMessage::SIZE - 1]),
            Err(Error::DataUnderflow)
        );
    }

    #[test]
    fn test_base_message_tolerates_later_options() {
        let mut buf = [0; 576];

        let len = with_options(&[0, 53, 1, 5, 51, 7, 0], &mut buf);

        assert_eq!(Message::decode(&buf[..len]), Err(Error::DataUnderflow));
        assert_eq!(
            BaseMessage::decode(&buf[..len]).map(|base| base.message_type),
            Ok(MessageType::Ack)
        );

        let len = with_options(&[54, 4, 192, 168, 0, 1, 255], &mut buf);

        assert_eq!(
            BaseMessage::decode(&buf[..len]),
            Err(Error::InvalidMessageType)
        );
    }

    #[test]
    fn test_message_type() {
        assert_eq!(MessageType::Discover.as_str(), "DHCPDISCOVER");
        assert_eq!(MessageType::try_from(5).ok(), Some(MessageType::Ack));
        assert!(MessageType::try_from(0).is_err());
    }
}
