//! Endpoint transaction state machine
//!
//! One [`Endpoint`] tracks one direction of one endpoint number. It knows how
//! much of the borrowed buffer has moved, and decides when a transfer is over.
//! It never talks to the low-level driver; the caller does that with the
//! packet sizes computed here.

use crate::Error;
use usb_device::{
    endpoint::{EndpointAddress, EndpointType},
    UsbDirection,
};

/// The transaction state of one endpoint direction
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EndpointState {
    /// Not configured. Transfers are a programming error.
    Disabled,
    /// Configured, and ready for a transfer
    Idle,
    /// A transfer is prepared or in flight
    Busy,
}

/// Describes an endpoint for [`init_endpoint()`](crate::Usb::init_endpoint)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EndpointConfig {
    address: EndpointAddress,
    kind: EndpointType,
    max_packet_size: u16,
}

impl EndpointConfig {
    pub fn new(address: EndpointAddress, kind: EndpointType, max_packet_size: u16) -> Self {
        EndpointConfig {
            address,
            kind,
            max_packet_size,
        }
    }

    /// A bulk endpoint
    pub fn bulk(address: EndpointAddress, max_packet_size: u16) -> Self {
        Self::new(address, EndpointType::Bulk, max_packet_size)
    }

    /// An interrupt endpoint
    pub fn interrupt(address: EndpointAddress, max_packet_size: u16) -> Self {
        Self::new(address, EndpointType::Interrupt, max_packet_size)
    }

    pub fn address(&self) -> EndpointAddress {
        self.address
    }

    pub fn kind(&self) -> EndpointType {
        self.kind
    }

    pub fn max_packet_size(&self) -> u16 {
        self.max_packet_size
    }

    pub(crate) fn max_packet_len(&self) -> usize {
        self.max_packet_size as usize
    }
}

/// Memory that backs a transfer
pub(crate) enum Buffer<'a> {
    None,
    In(&'a [u8]),
    Out(&'a mut [u8]),
    /// Reply bytes owned by the control transfer context
    Control,
}

/// What the caller should do after a packet moved
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Progress {
    /// Schedule the next packet
    Continue,
    /// The transfer is done; take the buffer back
    Complete,
}

pub(crate) struct Endpoint<'a> {
    config: Option<EndpointConfig>,
    state: EndpointState,
    buffer: Buffer<'a>,
    requested: usize,
    transferred: usize,
    /// Size of the packet the low-level driver is moving right now
    in_flight: usize,
    started: bool,
    /// Send a zero-length packet after IN transfers that end on a packet boundary
    zlt: bool,
    /// Trailing zero-length packet still owed by this transfer
    send_zlp: bool,
    halted: bool,
}

impl<'a> Endpoint<'a> {
    pub const fn new() -> Self {
        Endpoint {
            config: None,
            state: EndpointState::Disabled,
            buffer: Buffer::None,
            requested: 0,
            transferred: 0,
            in_flight: 0,
            started: false,
            zlt: false,
            send_zlp: false,
            halted: false,
        }
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Returns the endpoint configuration
    ///
    /// # Panics
    ///
    /// Panics if the endpoint isn't enabled.
    pub fn enabled_config(&self) -> &EndpointConfig {
        match &self.config {
            Some(config) => config,
            None => panic!("Endpoint is not initialized"),
        }
    }

    /// DISABLED -> IDLE
    ///
    /// # Panics
    ///
    /// Panics if the endpoint is already enabled.
    pub fn enable(&mut self, config: EndpointConfig) {
        assert!(
            self.state == EndpointState::Disabled,
            "EP{} {:?} is already initialized",
            config.address().index(),
            config.address().direction(),
        );
        *self = Endpoint::new();
        self.config = Some(config);
        self.state = EndpointState::Idle;
    }

    /// Any state -> DISABLED, dropping the transfer without completing it
    pub fn disable(&mut self) {
        *self = Endpoint::new();
    }

    /// BUSY -> IDLE, dropping the transfer without completing it
    ///
    /// Does nothing to a disabled endpoint.
    pub fn cancel(&mut self) {
        if self.state == EndpointState::Busy {
            self.state = EndpointState::Idle;
            self.reset_transfer();
        }
    }

    fn reset_transfer(&mut self) {
        self.buffer = Buffer::None;
        self.requested = 0;
        self.transferred = 0;
        self.in_flight = 0;
        self.started = false;
        self.send_zlp = false;
    }

    pub fn set_zlt(&mut self, zlt: bool) {
        self.zlt = zlt;
    }

    pub fn zlt(&self) -> bool {
        self.zlt
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// IDLE -> BUSY, taking a borrowed buffer for `len` bytes
    ///
    /// `send_zlp` requests a trailing zero-length packet if an IN transfer
    /// ends on a packet boundary.
    ///
    /// # Panics
    ///
    /// Panics if the endpoint is disabled.
    pub fn prepare(&mut self, buffer: Buffer<'a>, len: usize, send_zlp: bool) -> Result<(), Error> {
        match self.state {
            EndpointState::Disabled => panic!("Transfer prepared on a disabled endpoint"),
            EndpointState::Busy => Err(Error::EndpointBusy),
            EndpointState::Idle => {
                self.reset_transfer();
                self.buffer = buffer;
                self.requested = len;
                self.send_zlp = send_zlp && len > 0;
                self.state = EndpointState::Busy;
                Ok(())
            }
        }
    }

    /// Mark the prepared transfer as handed to the hardware
    ///
    /// # Panics
    ///
    /// Panics if there's no prepared transfer, or if it already started.
    pub fn start(&mut self) {
        assert!(
            self.state == EndpointState::Busy && !self.started,
            "No prepared transfer to start"
        );
        self.started = true;
    }

    /// Size of the next packet to send, or to receive
    pub fn next_packet_len(&self) -> usize {
        let max_packet_len = self.enabled_config().max_packet_len();
        self.requested.saturating_sub(self.transferred).min(max_packet_len)
    }

    /// The bytes of the next IN packet
    ///
    /// `control` holds the reply for [`Buffer::Control`] transfers.
    pub fn in_packet<'s>(&'s self, control: &'s [u8]) -> &'s [u8] {
        let start = self.transferred;
        let end = start + self.next_packet_len();
        match &self.buffer {
            Buffer::In(data) => &data[start..end],
            Buffer::Control => &control[start..end],
            Buffer::None | Buffer::Out(_) => &[],
        }
    }

    /// The part of the OUT buffer that receives the next packet
    pub fn out_window(&mut self) -> &mut [u8] {
        let start = self.transferred;
        let end = start + self.next_packet_len();
        match &mut self.buffer {
            Buffer::Out(data) => &mut data[start..end],
            _ => Default::default(),
        }
    }

    /// Record the size of the packet handed to the hardware
    pub fn set_in_flight(&mut self, len: usize) {
        self.in_flight = len;
    }

    /// An IN packet was sent
    pub fn in_packet_sent(&mut self) -> Progress {
        let max_packet_len = self.enabled_config().max_packet_len();
        self.transferred += self.in_flight;
        if self.transferred < self.requested {
            Progress::Continue
        } else if self.send_zlp && self.in_flight == max_packet_len {
            self.send_zlp = false;
            Progress::Continue
        } else {
            Progress::Complete
        }
    }

    /// An OUT packet of `len` bytes landed in the window
    pub fn out_packet_received(&mut self, len: usize) -> Progress {
        let max_packet_len = self.enabled_config().max_packet_len();
        self.transferred += len;
        if len < max_packet_len || self.transferred >= self.requested {
            Progress::Complete
        } else {
            Progress::Continue
        }
    }

    /// BUSY -> IDLE, returning the buffer and the number of bytes moved
    pub fn complete(&mut self) -> (Buffer<'a>, usize) {
        let buffer = core::mem::replace(&mut self.buffer, Buffer::None);
        let transferred = self.transferred;
        self.state = EndpointState::Idle;
        self.reset_transfer();
        (buffer, transferred)
    }
}

/// Direction helper for the control endpoint pair
pub(crate) fn ep0(direction: UsbDirection) -> EndpointAddress {
    EndpointAddress::from_parts(0, direction)
}
