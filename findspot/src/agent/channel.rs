//! Control channel: one controller connection, whole frames only.

use findspot_common::{FrameStream, WireError};
use log::info;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};

use crate::domain::AgentError;

/// Listening socket waiting for the controller.
#[derive(Debug)]
pub struct ControlListener {
    listener: TcpListener,
}

impl ControlListener {
    /// Listen on all interfaces. Port 0 picks a free port.
    ///
    /// # Errors
    /// Returns [`AgentError::BindFailed`] if the port cannot be bound.
    pub fn bind(port: u16) -> Result<Self, AgentError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|source| AgentError::BindFailed { port, source })?;
        Ok(Self { listener })
    }

    /// # Errors
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Block until a controller connects.
    ///
    /// # Errors
    /// Returns [`AgentError::AcceptFailed`] if the accept call fails.
    pub fn accept(&self) -> Result<ControlChannel, AgentError> {
        self.listener.set_nonblocking(false).map_err(AgentError::AcceptFailed)?;
        let (stream, peer) = self.listener.accept().map_err(AgentError::AcceptFailed)?;
        info!("controller connected from {peer}");
        Ok(ControlChannel::new(stream))
    }

    /// Accept without blocking, for hosts that poll between other work.
    /// Returns `Ok(None)` if no controller is waiting.
    ///
    /// # Errors
    /// Returns [`AgentError::AcceptFailed`] on any failure other than "would block".
    pub fn poll_accept(&self) -> Result<Option<ControlChannel>, AgentError> {
        self.listener.set_nonblocking(true).map_err(AgentError::AcceptFailed)?;
        match self.listener.accept() {
            Ok((stream, peer)) => {
                // The session thread relies on blocking reads
                stream.set_nonblocking(false).map_err(AgentError::AcceptFailed)?;
                info!("controller connected from {peer}");
                Ok(Some(ControlChannel::new(stream)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(AgentError::AcceptFailed(e)),
        }
    }
}

/// Frame-level send/receive with the connected controller.
#[derive(Debug)]
pub struct ControlChannel<S = TcpStream> {
    frames: FrameStream<S>,
}

impl<S: Read + Write> ControlChannel<S> {
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self { frames: FrameStream::new(stream) }
    }

    /// Send one response frame.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be written.
    pub fn send(&mut self, body: &str) -> Result<usize, WireError> {
        self.frames.send(body)
    }

    /// Next command text, or an empty string if nothing usable arrived.
    pub fn recv_command(&mut self) -> String {
        self.frames.recv_or_empty()
    }

    pub fn get_ref(&self) -> &S {
        self.frames.get_ref()
    }
}
