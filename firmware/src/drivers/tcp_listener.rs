//! Binds `control_loop::ConnectionSource` to a non-blocking
//! `std::net::TcpListener`. "Accept at most one client per tick" is
//! implemented as a single non-blocking `accept()`, switched back to
//! blocking mode for the connection itself so the header read can suspend
//! (bounded, in the worst case, by the watchdog).

use std::io;
use std::net::{TcpListener, TcpStream};

use boltguard_core::control_loop::ConnectionSource;

pub struct HttpListener {
    listener: TcpListener,
}

impl HttpListener {
    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }
}

impl ConnectionSource for HttpListener {
    type Conn = TcpStream;

    fn try_accept(&mut self) -> Option<TcpStream> {
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                // The request itself is read to completion (or the
                // watchdog fires); only the accept is non-blocking.
                let _ = stream.set_nonblocking(false);
                Some(stream)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                log::warn!("TCP accept failed: {e}");
                None
            }
        }
    }
}
