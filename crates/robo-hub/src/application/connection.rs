//! The capability robot APIs use to talk to their device.
//!
//! A robot API does not own its device or the transport.  For the duration
//! of one call the hub lends it a [`DeviceLink`], which pairs the device with
//! the transport behind the [`Connection`] trait.  Tests substitute their own
//! `Connection` to observe what an API writes.

use robo_core::Address;
use tokio::sync::oneshot;

use crate::application::device::Device;
use crate::application::transport::Transport;

/// Connection operations a robot API relies on.
pub trait Connection {
    fn address(&self) -> &Address;
    fn is_connected(&self) -> bool;
    fn connect(&mut self, ready: Option<oneshot::Sender<Address>>);
    fn disconnect(&mut self, force: bool, done: Option<oneshot::Sender<()>>);
    /// Writes one buffer.  Dropped silently when there is no socket.
    fn send(&mut self, bytes: &[u8]);
    fn reset(&mut self);
}

/// A device borrowed together with the transport it is reached through.
pub struct DeviceLink<'a> {
    device: &'a mut Device,
    transport: &'a dyn Transport,
}

impl<'a> DeviceLink<'a> {
    pub fn new(device: &'a mut Device, transport: &'a dyn Transport) -> Self {
        Self { device, transport }
    }
}

impl Connection for DeviceLink<'_> {
    fn address(&self) -> &Address {
        self.device.address()
    }

    fn is_connected(&self) -> bool {
        self.device.is_connected()
    }

    fn connect(&mut self, ready: Option<oneshot::Sender<Address>>) {
        self.device.connect(self.transport, ready);
    }

    fn disconnect(&mut self, force: bool, done: Option<oneshot::Sender<()>>) {
        self.device.disconnect(self.transport, force, done);
    }

    fn send(&mut self, bytes: &[u8]) {
        self.device.send(self.transport, bytes);
    }

    fn reset(&mut self) {
        self.device.reset(self.transport);
    }
}
