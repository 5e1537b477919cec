//! Frame sources: where decoded frames and their local receive times come from.

use async_trait::async_trait;

use super::frame::Frame;
use super::timestamp::Timestamp;
use crate::error::Result;

/// Clock used to stamp frames on receipt.
pub type LocalClock = fn() -> Timestamp;

/// Pull-based producer of `(frame, local receive time)` pairs.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame.
    ///
    /// # Errors
    ///
    /// `PtpError::MalformedFrame` for an undecodable unit of input (the
    /// ingestion loop skips it), `PtpError::SourceClosed` at end of
    /// stream, anything else for transport failure.
    async fn read_frame(&mut self) -> Result<(Frame, Timestamp)>;
}

#[async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn read_frame(&mut self) -> Result<(Frame, Timestamp)> {
        (**self).read_frame().await
    }
}

#[cfg(feature = "tokio-runtime")]
pub use self::net::{StreamFrameSource, UdpFrameSource};

#[cfg(feature = "tokio-runtime")]
mod net {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::io::AsyncRead;
    use tokio::net::{ToSocketAddrs, UdpSocket};
    use tokio_util::codec::FramedRead;

    use super::{FrameSource, LocalClock};
    use crate::error::{PtpError, Result};
    use crate::protocol::ptp::codec::FrameCodec;
    use crate::protocol::ptp::frame::Frame;
    use crate::protocol::ptp::timestamp::Timestamp;

    /// Receive buffer size; larger datagrams are truncated to this.
    const RECV_BUF_SIZE: usize = 256;

    /// One frame per UDP datagram, stamped as soon as the datagram arrives.
    #[derive(Debug)]
    pub struct UdpFrameSource {
        socket: Arc<UdpSocket>,
        buf: Vec<u8>,
        clock: LocalClock,
        last_peer: Option<SocketAddr>,
    }

    impl UdpFrameSource {
        /// Bind a new socket.
        ///
        /// # Errors
        ///
        /// Returns `PtpError::Io` if the bind fails.
        pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
            let socket = UdpSocket::bind(addr).await?;
            Ok(Self::from_socket(Arc::new(socket)))
        }

        /// Wrap an existing socket.
        #[must_use]
        pub fn from_socket(socket: Arc<UdpSocket>) -> Self {
            Self {
                socket,
                buf: vec![0u8; RECV_BUF_SIZE],
                clock: Timestamp::now,
                last_peer: None,
            }
        }

        /// Stamp frames with `clock` instead of the system clock.
        #[must_use]
        pub fn with_clock(mut self, clock: LocalClock) -> Self {
            self.clock = clock;
            self
        }

        /// Local address of the socket.
        ///
        /// # Errors
        ///
        /// Returns `PtpError::Io` if the address cannot be queried.
        pub fn local_addr(&self) -> Result<SocketAddr> {
            Ok(self.socket.local_addr()?)
        }

        /// The underlying socket, shared.
        #[must_use]
        pub fn socket(&self) -> Arc<UdpSocket> {
            Arc::clone(&self.socket)
        }

        /// Sender of the most recent datagram.
        #[must_use]
        pub fn last_peer(&self) -> Option<SocketAddr> {
            self.last_peer
        }

        /// Send `frame` to `target` and return the local send time.
        ///
        /// For a `Delay_Req` the returned time is T3.
        ///
        /// # Errors
        ///
        /// Returns `PtpError::Io` if the send fails.
        pub async fn send_frame(&self, frame: Frame, target: SocketAddr) -> Result<Timestamp> {
            let bytes = frame.encode();
            self.socket.send_to(&bytes, target).await?;
            Ok((self.clock)())
        }
    }

    #[async_trait]
    impl FrameSource for UdpFrameSource {
        async fn read_frame(&mut self) -> Result<(Frame, Timestamp)> {
            let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
            let received = (self.clock)();
            self.last_peer = Some(peer);
            let frame = Frame::decode(&self.buf[..len])?;
            Ok((frame, received))
        }
    }

    /// Frames read back-to-back from a byte stream.
    #[derive(Debug)]
    pub struct StreamFrameSource<R> {
        inner: FramedRead<R, FrameCodec>,
        clock: LocalClock,
    }

    impl<R: AsyncRead + Unpin + Send> StreamFrameSource<R> {
        /// Frame `reader` with [`FrameCodec`].
        pub fn new(reader: R) -> Self {
            Self {
                inner: FramedRead::new(reader, FrameCodec::new()),
                clock: Timestamp::now,
            }
        }

        /// Stamp frames with `clock` instead of the system clock.
        #[must_use]
        pub fn with_clock(mut self, clock: LocalClock) -> Self {
            self.clock = clock;
            self
        }

        /// Recover the reader.
        pub fn into_inner(self) -> R {
            self.inner.into_inner()
        }
    }

    #[async_trait]
    impl<R: AsyncRead + Unpin + Send> FrameSource for StreamFrameSource<R> {
        async fn read_frame(&mut self) -> Result<(Frame, Timestamp)> {
            match self.inner.next().await {
                Some(Ok(frame)) => Ok((frame, (self.clock)())),
                Some(Err(e)) => Err(e),
                None => Err(PtpError::SourceClosed),
            }
        }
    }
}
