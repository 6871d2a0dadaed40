//! A hardware-independent USB device driver core
//!
//! `usbd-core` tracks the USB device state, runs one transaction state machine
//! per endpoint direction, and drives endpoint 0 control transfers, answering
//! the standard requests itself. It talks to the USB peripheral only through
//! the [`LowLevel`] trait, so the same core runs on any controller that can
//! move single packets.
//!
//! # Usage
//!
//! 1. Implement [`LowLevel`] for your USB peripheral.
//! 2. Implement [`Callbacks`] for your application. Supply descriptors from
//!    [`get_descriptor()`](Callbacks::get_descriptor), initialize endpoints when
//!    you see [`Event::Configured`], and optionally claim class or vendor
//!    requests in [`request_hook()`](Callbacks::request_hook).
//! 3. Build a [`Driver`], then call [`initialize()`](Driver::initialize) and
//!    [`start()`](Driver::start).
//! 4. Call [`poll()`](Driver::poll) from your USB interrupt handler.
//!
//! When you share the driver between the interrupt handler and your tasks,
//! wrap it in a [`BusAdapter`]. The adapter guards every access with a
//! critical section.
//!
//! ```
//! use usbd_core::{Callbacks, Config, Driver, Event, Interrupt, LowLevel, Usb, EndpointConfig};
//! use usb_device::{endpoint::EndpointAddress, UsbDirection};
//!
//! # struct Lld;
//! # impl LowLevel for Lld {
//! #   fn init(&mut self) {} fn start(&mut self) {} fn stop(&mut self) {}
//! #   fn set_address(&mut self, _: u8) {} fn init_endpoint(&mut self, _: &EndpointConfig) {}
//! #   fn disable_endpoints(&mut self) {} fn transmit(&mut self, _: EndpointAddress, _: &[u8]) {}
//! #   fn receive(&mut self, _: EndpointAddress, _: usize) {}
//! #   fn read(&mut self, _: EndpointAddress, _: &mut [u8]) -> usize { 0 }
//! #   fn read_setup(&mut self) -> [u8; 8] { [0; 8] } fn stall_endpoint(&mut self, _: EndpointAddress) {}
//! #   fn clear_stall(&mut self, _: EndpointAddress) {} fn poll(&mut self) -> Option<Interrupt> { None }
//! # }
//! static DEVICE_DESCRIPTOR: [u8; 18] = [
//!     18, 1, 0x00, 0x02, 0, 0, 0, 64, 0x09, 0x12, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 1,
//! ];
//!
//! struct App;
//!
//! impl<'a, L: LowLevel> Callbacks<'a, L> for App {
//!     fn event(&mut self, usb: &mut Usb<'a, L>, event: Event) {
//!         if event == Event::Configured {
//!             let ep1_in = EndpointAddress::from_parts(1, UsbDirection::In);
//!             usb.init_endpoint(EndpointConfig::bulk(ep1_in, 64));
//!         }
//!     }
//!     fn get_descriptor(&mut self, _: &mut Usb<'a, L>, kind: u8, _: u8, _: u16) -> Option<&'a [u8]> {
//!         (kind == 1).then_some(&DEVICE_DESCRIPTOR[..])
//!     }
//! }
//!
//! let mut driver = Driver::new(Lld, App, Config::new().self_powered(true));
//! driver.initialize().unwrap();
//! driver.start().unwrap();
//!
//! // In the USB interrupt handler...
//! driver.poll();
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod log;

mod bus;
mod callbacks;
mod control;
mod driver;
mod endpoint;
mod lld;
mod setup;
mod standard;
mod state;

#[cfg(test)]
mod mock;

pub use bus::BusAdapter;
pub use callbacks::{Callbacks, ControlReply, Event};
pub use control::{ControlStage, Owner};
pub use driver::{DeviceState, DeviceStatus, Driver, Usb};
pub use endpoint::{EndpointConfig, EndpointState};
pub use lld::{Interrupt, LowLevel};
pub use setup::{Recipient, RequestType, SetupPacket};
pub use state::MAX_ENDPOINTS;

/// Errors the caller can recover from
///
/// Calling an operation from the wrong device or endpoint state is a
/// programming error, and panics instead.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// [`Driver::initialize()`] was already called
    AlreadyInitialized,
    /// The device state doesn't allow the operation
    InvalidState,
    /// The endpoint already has a transfer. Try again after it completes.
    EndpointBusy,
    /// The device isn't suspended, or the host didn't arm remote wakeup
    RemoteWakeupDisabled,
}

/// Driver configuration
///
/// ```
/// use usbd_core::Config;
///
/// const CONFIG: Config = Config::new()
///     .ep0_max_packet_size(16)
///     .self_powered(true);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
    ep0_max_packet_size: u16,
    self_powered: bool,
}

impl Config {
    /// A bus-powered device with a 64 byte control endpoint
    pub const fn new() -> Self {
        Config {
            ep0_max_packet_size: 64,
            self_powered: false,
        }
    }

    /// Set the control endpoint's max packet size
    ///
    /// # Panics
    ///
    /// Panics if `size` is not 8, 16, 32, or 64.
    pub const fn ep0_max_packet_size(mut self, size: u16) -> Self {
        assert!(
            matches!(size, 8 | 16 | 32 | 64),
            "EP0 max packet size must be 8, 16, 32, or 64"
        );
        self.ep0_max_packet_size = size;
        self
    }

    /// Report the device as self-powered in GET_STATUS
    pub const fn self_powered(mut self, self_powered: bool) -> Self {
        self.self_powered = self_powered;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
