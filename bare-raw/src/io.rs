//! Traits for the link/transport collaborators moving raw IPv4 datagrams, and helpers
//! driving `Ipv4Packet` containers over them

use core::fmt;
use core::net::Ipv4Addr;

use embedded_io_async::{ErrorKind, ErrorType};

use log::debug;

use crate as raw;
use crate::ip::Ipv4Packet;

#[derive(Debug)]
pub enum Error<E> {
    Io(E),
    Raw(raw::Error),
}

impl<E> From<raw::Error> for Error<E> {
    fn from(value: raw::Error) -> Self {
        Self::Raw(value)
    }
}

impl<E> embedded_io_async::Error for Error<E>
where
    E: embedded_io_async::Error,
{
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(err) => err.kind(),
            Self::Raw(_) => ErrorKind::InvalidData,
        }
    }
}

impl<E> fmt::Display for Error<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Raw(err) => write!(f, "Raw error: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E> where E: std::error::Error {}

/// This trait is implemented by the link layer and models sending complete IPv4 datagrams.
pub trait RawSend: ErrorType {
    /// Place the provided datagram on the wire
    async fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// This trait is implemented by the link layer and models receiving IPv4 datagrams.
pub trait RawReceive: ErrorType {
    /// Receive a datagram into the provided buffer.
    ///
    /// If the received datagram exceeds the buffer's length, the remaining bytes are discarded,
    /// but the full datagram size is still returned, allowing the recipient to detect truncation.
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<T> RawSend for &mut T
where
    T: RawSend,
{
    async fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).send(data).await
    }
}

impl<T> RawReceive for &mut T
where
    T: RawReceive,
{
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).receive(buffer).await
    }
}

/// Sends the datagram the packet was last filled with
pub async fn send<T, const S: usize>(
    mut sender: T,
    packet: &Ipv4Packet<S>,
) -> Result<(), Error<T::Error>>
where
    T: RawSend,
{
    sender.send(packet.as_bytes()).await.map_err(Error::Io)
}

/// Receives datagrams into `packet` until one that is intact and addressed to `local`
/// (or broadcast) arrives. An unspecified `local` accepts any destination.
///
/// Datagrams larger than the packet, malformed, corrupt and foreign datagrams are dropped.
pub async fn receive<T, const S: usize>(
    mut receiver: T,
    packet: &mut Ipv4Packet<S>,
    local: Ipv4Addr,
) -> Result<(), Error<T::Error>>
where
    T: RawReceive,
{
    let mut buf = [0; S];

    loop {
        // A frame longer than the buffer may still carry a datagram that fits, the rest being
        // link-layer padding; `load` rejects the ones that do not fit.
        let len = receiver.receive(&mut buf).await.map_err(Error::Io)?.min(S);

        match packet.load(&buf[..len]) {
            Ok(hdr) if !hdr.is_checksum_valid() => {
                debug!("Dropping datagram from {} with a bad checksum", hdr.src);
            }
            Ok(hdr) => {
                if local.is_unspecified() || hdr.dst == local || hdr.dst.is_broadcast() {
                    break Ok(());
                }

                debug!("Dropping datagram for {}", hdr.dst);
            }
            Err(err) => debug!("Dropping malformed datagram: {}", err),
        }
    }
}
