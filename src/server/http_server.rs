use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Wrapper around may_minihttp's HTTP server
///
/// Accepts up to 32 request headers, enough for traffic relayed through API
/// gateways and browsers sending CORS headers.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening socket until it accepts connections.
    ///
    /// # Errors
    ///
    /// `TimedOut` when the server is not reachable within ~250ms (50 × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the accept coroutine and wait for it to finish.
    pub fn stop(self) {
        info!(addr = %self.addr, "Stopping HTTP server");
        // SAFETY: `cancel` is unsafe in may; the handle is valid while we own
        // it and cancellation is the intended shutdown path.
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            debug!(addr = %self.addr, "Server coroutine ended by cancellation");
        }
    }

    /// Block until the server coroutine finishes.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the server coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start serving.
    ///
    /// # Errors
    ///
    /// Fails when the address does not resolve or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0).start(addr)?;
        info!(addr = %addr, "HTTP server listening");
        Ok(ServerHandle { addr, handle })
    }
}
