//! The low-level driver interface
//!
//! The core never touches registers. Everything chip-specific lives behind
//! [`LowLevel`], which moves single packets and reports what the hardware
//! saw through [`poll()`](LowLevel::poll).

use crate::endpoint::EndpointConfig;
use usb_device::endpoint::EndpointAddress;

/// An event reported by the low-level driver
///
/// Endpoint numbers are the raw index, `0..8`. The direction is implied by the
/// variant.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Interrupt {
    /// The host reset the bus
    Reset,
    /// The bus went idle long enough for the device to suspend
    Suspend,
    /// Bus activity resumed after a suspend
    Wakeup,
    /// Start of frame, carrying the frame number
    Sof(u16),
    /// A setup packet is waiting on EP0 OUT
    ///
    /// Fetch it with [`read_setup()`](LowLevel::read_setup).
    Setup,
    /// The packet handed to [`transmit()`](LowLevel::transmit) was sent
    InComplete(u8),
    /// A packet arrived on an endpoint primed with [`receive()`](LowLevel::receive)
    ///
    /// Fetch it with [`read()`](LowLevel::read).
    OutComplete(u8),
    /// The hardware flagged an error on this endpoint, like an underrun
    TransferError(EndpointAddress),
}

/// Chip-specific USB device controller access
///
/// An implementation owns the USB peripheral. The core calls these methods
/// from inside its critical section, so none of them should block for long.
pub trait LowLevel {
    /// Bring up the controller, leaving it disconnected from the bus
    fn init(&mut self);
    /// Connect to the bus
    fn start(&mut self);
    /// Disconnect from the bus, and put the controller in a low-power state
    fn stop(&mut self);
    /// Program the device address
    ///
    /// The core calls this once the SET_ADDRESS status stage completes, and
    /// with address zero on bus reset.
    fn set_address(&mut self, address: u8);
    /// Configure one direction of one endpoint
    ///
    /// The core calls this again when it needs to reset the endpoint's
    /// data toggle, for instance after a halt is cleared.
    fn init_endpoint(&mut self, config: &EndpointConfig);
    /// Disable all non-zero endpoints, discarding any primed packets
    fn disable_endpoints(&mut self);
    /// Send one packet
    ///
    /// The implementation copies `packet` into its own endpoint memory before
    /// returning. An empty `packet` is a zero-length packet.
    fn transmit(&mut self, addr: EndpointAddress, packet: &[u8]);
    /// Prime an OUT endpoint to accept one packet of up to `max_len` bytes
    fn receive(&mut self, addr: EndpointAddress, max_len: usize);
    /// Copy the last received packet into `buffer`
    ///
    /// Returns the size of the packet the host sent. If that's larger than
    /// `buffer`, only `buffer.len()` bytes are copied.
    fn read(&mut self, addr: EndpointAddress, buffer: &mut [u8]) -> usize;
    /// Take the setup packet from EP0 OUT
    fn read_setup(&mut self) -> [u8; 8];
    /// Respond to the host with STALL on this endpoint
    fn stall_endpoint(&mut self, addr: EndpointAddress);
    /// Stop stalling this endpoint
    fn clear_stall(&mut self, addr: EndpointAddress);
    /// Return the next pending event, if any
    fn poll(&mut self) -> Option<Interrupt>;
    /// Signal resume to the host
    ///
    /// Controllers without remote wakeup support can keep the default.
    fn remote_wakeup(&mut self) {}
}
