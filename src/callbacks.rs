//! Application callbacks
//!
//! Implement [`Callbacks`] to hear about device events, and to override
//! control request handling. Every method has a default, so an application
//! only writes the ones it needs. The driver calls these synchronously from
//! [`Driver::poll()`](crate::Driver::poll), inside whatever critical section
//! guards the driver.

use crate::{driver::Usb, lld::LowLevel, setup::SetupPacket};
use usb_device::endpoint::EndpointAddress;

/// Device-level events
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
    /// The host reset the bus. All non-zero endpoints are disabled.
    Reset,
    /// The host assigned an address, and the status stage completed
    Address,
    /// The host selected a non-zero configuration
    ///
    /// Non-zero endpoints are disabled when this fires; initialize the
    /// endpoints for the new configuration here.
    Configured,
    /// The host selected configuration zero
    Unconfigured,
    Suspend,
    Wakeup,
    /// A control transfer was stalled
    Stalled,
    /// The hardware reported an error on an endpoint
    ///
    /// The transfer isn't retried. It stays pending until the next packet
    /// completes, or until the endpoint is disabled.
    TransferError(EndpointAddress),
}

/// How the application answers a control request
pub enum ControlReply<'a> {
    /// Send these bytes in the data stage
    ///
    /// Truncated to `wLength`.
    In(&'a [u8]),
    /// Receive the data stage into this buffer
    ///
    /// The data arrives in [`Callbacks::control_out()`].
    Out(&'a mut [u8]),
    /// No data stage; acknowledge in the status stage
    Ack,
    /// Reject the request
    Stall,
}

/// Application handler slots
///
/// The driver resolves these once, when it's constructed.
#[allow(unused_variables)]
pub trait Callbacks<'a, L: LowLevel> {
    /// A device-level event occurred
    fn event(&mut self, usb: &mut Usb<'a, L>, event: Event) {}

    /// First look at every control request
    ///
    /// Return `Some` to claim the request. The reply then owns the rest of the
    /// control transfer. Return `None` to let the driver handle the request.
    fn request_hook(
        &mut self,
        usb: &mut Usb<'a, L>,
        setup: &SetupPacket,
    ) -> Option<ControlReply<'a>> {
        None
    }

    /// Supply a descriptor for a standard GET_DESCRIPTOR request
    ///
    /// Return the complete descriptor; the driver truncates it to what the
    /// host asked for. `None` stalls the request.
    fn get_descriptor(
        &mut self,
        usb: &mut Usb<'a, L>,
        kind: u8,
        index: u8,
        language: u16,
    ) -> Option<&'a [u8]> {
        None
    }

    /// The data stage of a claimed control OUT request finished
    ///
    /// `data` is the buffer from [`ControlReply::Out`], and `len` bytes of it
    /// are valid. Return `false` to stall instead of acknowledging.
    fn control_out(
        &mut self,
        usb: &mut Usb<'a, L>,
        setup: &SetupPacket,
        data: &'a mut [u8],
        len: usize,
    ) -> bool {
        true
    }

    /// An IN transfer finished
    ///
    /// Returns the buffer from [`transmit()`](Usb::transmit).
    fn in_complete(&mut self, usb: &mut Usb<'a, L>, addr: EndpointAddress, data: &'a [u8]) {}

    /// An OUT transfer finished, with `len` bytes in `data`
    fn out_complete(
        &mut self,
        usb: &mut Usb<'a, L>,
        addr: EndpointAddress,
        data: &'a mut [u8],
        len: usize,
    ) {
    }

    /// Start of frame
    fn sof(&mut self, usb: &mut Usb<'a, L>, frame: u16) {}
}

/// No callbacks. The driver handles standard requests, and stalls everything else.
impl<'a, L: LowLevel> Callbacks<'a, L> for () {}
