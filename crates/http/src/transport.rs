//! The outbound side of a connection.
//!
//! The engine never owns a socket. It talks to the network stack through
//! [`Transport`], whose calls only queue work: completion of a send is
//! reported back later as a *sent* event, and a requested disconnect is
//! reported back as a *disconnect* event. Implementations must not call back
//! into the engine from inside these methods.

use crate::protocol::SendError;

pub trait Transport {
    /// Queues `data` for sending.
    ///
    /// An error means the bytes were not accepted; the caller treats this as
    /// fatal for the connection.
    fn send(&mut self, data: &[u8]) -> Result<(), SendError>;

    /// Asks the stack to close the connection.
    fn disconnect(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        (**self).send(data)
    }

    fn disconnect(&mut self) {
        (**self).disconnect();
    }
}
