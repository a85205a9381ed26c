//! Retrying remote calls over short-lived transports.
//!
//! A [`Client`] knows nothing about protocols or serialization. For every call it asks a
//! [`TransportFactory`] for a fresh transport, hands it to the caller's closure, and
//! closes it again, all inside one [`Retrier::run`]. A failure to open the transport
//! counts as a failed attempt like any other error.
//!
//! # Examples
//!
//! ```rust
//! use retrywrap::rpc::{Client, Transport, TransportFactory};
//! use retrywrap::{NoopBackoff, Retrier};
//!
//! struct Loopback;
//!
//! impl Transport for Loopback {
//!     fn close(&mut self) {}
//! }
//!
//! struct LoopbackFactory;
//!
//! impl TransportFactory for LoopbackFactory {
//!     type Transport = Loopback;
//!     type Error = String;
//!
//!     fn open(&self) -> Result<Loopback, String> {
//!         Ok(Loopback)
//!     }
//! }
//!
//! let client = Client::new(LoopbackFactory)
//!     .with_retrier(Retrier::new().with_max_attempts(3).with_backoff(NoopBackoff));
//!
//! let reply = client.call(|_transport| Ok::<_, String>("pong"));
//! assert_eq!(reply, Ok("pong"));
//! ```

use std::fmt;

use crate::retry::Retrier;

/// An open connection that must be closed when the call is done.
pub trait Transport {
    /// Release the connection. Called exactly once per opened transport.
    fn close(&mut self);
}

/// Opens transports on demand.
pub trait TransportFactory {
    /// The transport this factory opens.
    type Transport: Transport;
    /// Error for both opening the transport and the calls made over it.
    type Error;

    /// Open a new transport.
    fn open(&self) -> Result<Self::Transport, Self::Error>;
}

/// Closes the transport however the call exits, unwinding included.
struct OpenTransport<T: Transport>(T);

impl<T: Transport> Drop for OpenTransport<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs remote calls through a [`Retrier`], one transport per attempt.
///
/// The retrier defaults to [`Retrier::new`], i.e. a single attempt.
pub struct Client<F: TransportFactory> {
    factory: F,
    retrier: Retrier<F::Error>,
}

impl<F> Client<F>
where
    F: TransportFactory,
    F::Error: 'static,
{
    /// Create a client with the default retrier.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            retrier: Retrier::new(),
        }
    }

    /// Replace the retrier.
    pub fn with_retrier(mut self, retrier: Retrier<F::Error>) -> Self {
        self.retrier = retrier;
        self
    }
}

impl<F: TransportFactory> Client<F> {
    /// The transport factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The retrier wrapped around every call.
    pub fn retrier(&self) -> &Retrier<F::Error> {
        &self.retrier
    }

    /// Perform `call` over a fresh transport, retrying according to the retrier.
    pub fn call<T, C>(&self, mut call: C) -> Result<T, F::Error>
    where
        C: FnMut(&mut F::Transport) -> Result<T, F::Error>,
    {
        self.retrier.run(|| {
            let mut transport = OpenTransport(self.factory.open()?);
            call(&mut transport.0)
        })
    }
}

impl<F> fmt::Debug for Client<F>
where
    F: TransportFactory + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("factory", &self.factory)
            .field("retrier", &self.retrier)
            .finish()
    }
}
