//! The USB device driver
//!
//! [`Driver`] owns the low-level driver, the device state, and the endpoint
//! table. It's split in two: [`Usb`] holds everything the application may
//! touch from a callback, and the driver adds lifecycle control and event
//! dispatch on top.

use crate::{
    callbacks::{Callbacks, Event},
    control::{Control, ControlStage, Owner},
    endpoint::{ep0, Buffer, EndpointConfig, EndpointState, Progress},
    lld::{Interrupt, LowLevel},
    state::Endpoints,
    Config, Error,
};
use usb_device::{
    endpoint::{EndpointAddress, EndpointType},
    UsbDirection,
};

/// The USB device state
///
/// States are ordered; a state compares greater than the states it can only
/// be reached through.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum DeviceState {
    /// Constructed, but not initialized
    Uninit,
    /// Initialized, and disconnected from the bus
    Stop,
    /// Connected, with the default address
    Ready,
    /// The host assigned an address
    Selected,
    /// The host selected a configuration
    Active,
}

bitflags::bitflags! {
    /// The device's GET_STATUS bits
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct DeviceStatus : u16 {
        const SELF_POWERED = 1 << 0;
        const REMOTE_WAKEUP = 1 << 1;
    }
}

/// The outcome of an OUT packet
pub(crate) enum Received<'a> {
    /// Nothing was waiting for the packet. It was discarded.
    Spurious,
    /// The transfer needs more packets
    Pending,
    /// The transfer is over
    ///
    /// `overrun` is set when the host sent more than the buffer could hold.
    Complete {
        buffer: Buffer<'a>,
        len: usize,
        overrun: bool,
    },
}

/// Device state and endpoints
///
/// Callbacks receive a `&mut Usb` to queue transfers, and to manage
/// endpoints. Operations that require a particular device or endpoint state
/// panic when called from the wrong state.
pub struct Usb<'a, L> {
    pub(crate) lld: L,
    pub(crate) state: DeviceState,
    pub(crate) address: u8,
    pub(crate) configuration: u8,
    pub(crate) status: DeviceStatus,
    pub(crate) suspended: bool,
    pub(crate) endpoints: Endpoints<'a>,
    pub(crate) control: Control,
    ep0_max_packet_size: u16,
}

impl<'a, L: LowLevel> Usb<'a, L> {
    fn new(lld: L, config: Config) -> Self {
        let mut status = DeviceStatus::empty();
        status.set(DeviceStatus::SELF_POWERED, config.self_powered);
        Usb {
            lld,
            state: DeviceState::Uninit,
            address: 0,
            configuration: 0,
            status,
            suspended: false,
            endpoints: Endpoints::new(),
            control: Control::new(),
            ep0_max_packet_size: config.ep0_max_packet_size,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// The device address that's active on the bus
    ///
    /// A SET_ADDRESS request isn't reflected here until its status stage
    /// completes.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The selected configuration value, or zero
    pub fn configuration(&self) -> u8 {
        self.configuration
    }

    /// Indicates if the bus is suspended
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The bits reported by GET_STATUS(device)
    pub fn device_status(&self) -> DeviceStatus {
        self.status
    }

    pub fn set_self_powered(&mut self, self_powered: bool) {
        self.status.set(DeviceStatus::SELF_POWERED, self_powered);
    }

    /// The stage of the active control transfer
    pub fn control_stage(&self) -> ControlStage {
        self.control.stage()
    }

    /// Which handler owns the active control transfer
    ///
    /// `None` when there's no control transfer.
    pub fn control_owner(&self) -> Option<Owner> {
        self.control.owner()
    }

    /// # Panics
    ///
    /// Panics if the endpoint number is eight or greater.
    pub fn endpoint_state(&self, addr: EndpointAddress) -> EndpointState {
        self.endpoints.endpoint(addr).state()
    }

    /// Indicates if the endpoint is halted
    ///
    /// # Panics
    ///
    /// Panics if the endpoint number is eight or greater.
    pub fn is_halted(&self, addr: EndpointAddress) -> bool {
        self.endpoints.endpoint(addr).is_halted()
    }

    pub fn lld(&self) -> &L {
        &self.lld
    }

    pub fn lld_mut(&mut self) -> &mut L {
        &mut self.lld
    }

    /// Enable a non-zero endpoint
    ///
    /// Call this when you see [`Event::Configured`]. The endpoint moves from
    /// `Disabled` to `Idle`.
    ///
    /// # Panics
    ///
    /// Panics if the device isn't at least `Ready`, if `config` names EP0 or a
    /// control endpoint, or if the endpoint is already enabled.
    pub fn init_endpoint(&mut self, config: EndpointConfig) {
        let addr = config.address();
        assert!(
            self.state >= DeviceState::Ready,
            "EP{} initialized while the device is {:?}",
            addr.index(),
            self.state
        );
        assert!(addr.index() != 0, "EP0 is managed by the driver");
        assert!(
            config.kind() != EndpointType::Control,
            "Only EP0 may be a control endpoint"
        );

        self.endpoints.endpoint_mut(addr).enable(config);
        self.lld.init_endpoint(&config);
        debug!(
            "INIT EP{} {} MPS {}",
            addr.index(),
            u8::from(addr),
            config.max_packet_size()
        );
    }

    /// Disable all non-zero endpoints
    ///
    /// In-flight transfers are cancelled. Their completion callbacks never
    /// run, and their buffers are released.
    ///
    /// # Panics
    ///
    /// Panics if the driver isn't initialized.
    pub fn disable_endpoints(&mut self) {
        assert!(
            self.state != DeviceState::Uninit,
            "Endpoints disabled before initialization"
        );
        self.disable_nonzero_endpoints();
    }

    pub(crate) fn disable_nonzero_endpoints(&mut self) {
        for ep in self.endpoints.nonzero_endpoints_iter_mut() {
            ep.disable();
        }
        self.lld.disable_endpoints();
        debug!("DISABLE ENDPOINTS");
    }

    /// Send ZLPs after IN transfers that end on a packet boundary
    ///
    /// The setting lasts until the endpoint is disabled. Call it after
    /// [`init_endpoint()`](Usb::init_endpoint).
    ///
    /// # Panics
    ///
    /// Panics if the endpoint is disabled.
    pub fn enable_zlt(&mut self, addr: EndpointAddress) {
        let ep = self.endpoints.endpoint_mut(addr);
        assert!(
            ep.state() != EndpointState::Disabled,
            "EP{} is disabled",
            addr.index()
        );
        ep.set_zlt(true);
    }

    fn check_transfer(&self, addr: EndpointAddress, direction: UsbDirection) {
        assert!(
            self.state == DeviceState::Active,
            "EP{} transfer while the device is {:?}",
            addr.index(),
            self.state
        );
        assert!(addr.index() != 0, "EP0 transfers belong to the control engine");
        assert!(
            addr.direction() == direction,
            "EP{} has the wrong direction for this transfer",
            addr.index()
        );
    }

    /// Prepare an IN transfer of all of `data`
    ///
    /// The endpoint keeps `data` until the transfer completes, or until it's
    /// disabled. Start the transfer with [`start_transfer()`](Usb::start_transfer).
    ///
    /// # Panics
    ///
    /// Panics if the device isn't `Active`, if `addr` isn't a non-zero IN
    /// endpoint, or if the endpoint is disabled.
    pub fn prepare_in(&mut self, addr: EndpointAddress, data: &'a [u8]) -> Result<(), Error> {
        self.check_transfer(addr, UsbDirection::In);
        let ep = self.endpoints.endpoint_mut(addr);
        let zlt = ep.zlt();
        ep.prepare(Buffer::In(data), data.len(), zlt)
    }

    /// Prepare an OUT transfer that fills up to all of `data`
    ///
    /// # Panics
    ///
    /// Panics if the device isn't `Active`, if `addr` isn't a non-zero OUT
    /// endpoint, or if the endpoint is disabled.
    pub fn prepare_out(&mut self, addr: EndpointAddress, data: &'a mut [u8]) -> Result<(), Error> {
        self.check_transfer(addr, UsbDirection::Out);
        let len = data.len();
        self.endpoints
            .endpoint_mut(addr)
            .prepare(Buffer::Out(data), len, false)
    }

    /// Hand the prepared transfer to the hardware
    ///
    /// # Panics
    ///
    /// Panics if the device isn't `Active`, or if there's no prepared transfer.
    pub fn start_transfer(&mut self, addr: EndpointAddress) {
        self.check_transfer(addr, addr.direction());
        self.endpoints.endpoint_mut(addr).start();
        self.kick(addr);
        trace!("START EP{} {}", addr.index(), u8::from(addr));
    }

    /// Prepare, then start, an IN transfer
    pub fn transmit(&mut self, addr: EndpointAddress, data: &'a [u8]) -> Result<(), Error> {
        self.prepare_in(addr, data)?;
        self.start_transfer(addr);
        Ok(())
    }

    /// Prepare, then start, an OUT transfer
    pub fn receive(&mut self, addr: EndpointAddress, data: &'a mut [u8]) -> Result<(), Error> {
        self.prepare_out(addr, data)?;
        self.start_transfer(addr);
        Ok(())
    }

    /// Halt a non-zero endpoint
    ///
    /// # Panics
    ///
    /// Panics if `addr` is EP0, or if the endpoint is disabled.
    pub fn stall_endpoint(&mut self, addr: EndpointAddress) {
        self.check_halt(addr);
        self.halt(addr);
    }

    /// Clear a halt set by [`stall_endpoint()`](Usb::stall_endpoint)
    ///
    /// This behaves like the host's CLEAR_FEATURE(ENDPOINT_HALT): any pending
    /// transfer is dropped without a callback, and the low-level driver sees
    /// the endpoint again so it resets the data toggle.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is EP0, or if the endpoint is disabled.
    pub fn clear_stall(&mut self, addr: EndpointAddress) {
        self.check_halt(addr);
        self.clear_halt(addr);
    }

    fn check_halt(&self, addr: EndpointAddress) {
        assert!(addr.index() != 0, "EP0 stalls belong to the control engine");
        assert!(
            self.endpoints.endpoint(addr).state() != EndpointState::Disabled,
            "EP{} is disabled",
            addr.index()
        );
    }

    /// Halt an enabled, non-zero endpoint
    pub(crate) fn halt(&mut self, addr: EndpointAddress) {
        self.endpoints.endpoint_mut(addr).set_halted(true);
        self.lld.stall_endpoint(addr);
        debug!("HALT EP{} {}", addr.index(), u8::from(addr));
    }

    /// Cycle an enabled, non-zero endpoint through DISABLED back to IDLE
    pub(crate) fn clear_halt(&mut self, addr: EndpointAddress) {
        let ep = self.endpoints.endpoint_mut(addr);
        let config = *ep.enabled_config();
        let zlt = ep.zlt();
        ep.disable();
        ep.enable(config);
        ep.set_zlt(zlt);
        self.lld.init_endpoint(&config);
        self.lld.clear_stall(addr);
        debug!("CLEAR HALT EP{} {}", addr.index(), u8::from(addr));
    }

    /// Ask the host to resume the bus
    ///
    /// Only allowed while suspended, and only if the host armed remote wakeup.
    pub fn remote_wakeup(&mut self) -> Result<(), Error> {
        if self.suspended && self.status.contains(DeviceStatus::REMOTE_WAKEUP) {
            self.lld.remote_wakeup();
            debug!("REMOTE WAKEUP");
            Ok(())
        } else {
            Err(Error::RemoteWakeupDisabled)
        }
    }

    /// Schedule the next packet of a started transfer
    pub(crate) fn kick(&mut self, addr: EndpointAddress) {
        match addr.direction() {
            UsbDirection::In => {
                let ep = self.endpoints.endpoint(addr);
                let packet = ep.in_packet(self.control.data());
                let len = packet.len();
                self.lld.transmit(addr, packet);
                self.endpoints.endpoint_mut(addr).set_in_flight(len);
            }
            UsbDirection::Out => {
                let len = self.endpoints.endpoint(addr).next_packet_len();
                self.lld.receive(addr, len);
            }
        }
    }

    /// Account for a sent IN packet
    ///
    /// Returns the buffer and the bytes sent once the transfer completes.
    pub(crate) fn advance_in(&mut self, addr: EndpointAddress) -> Option<(Buffer<'a>, usize)> {
        let ep = self.endpoints.endpoint_mut(addr);
        if ep.state() != EndpointState::Busy || !ep.is_started() {
            warn!("EP{} IN complete without a transfer", addr.index());
            return None;
        }
        match ep.in_packet_sent() {
            Progress::Continue => {
                self.kick(addr);
                None
            }
            Progress::Complete => Some(ep.complete()),
        }
    }

    /// Fetch an OUT packet into the transfer buffer
    pub(crate) fn advance_out(&mut self, addr: EndpointAddress) -> Received<'a> {
        let ep = self.endpoints.endpoint_mut(addr);
        if ep.state() != EndpointState::Busy || !ep.is_started() {
            let len = self.lld.read(addr, &mut []);
            warn!("EP{} OUT {} bytes without a transfer", addr.index(), len);
            let _ = len;
            return Received::Spurious;
        }

        let window = ep.out_window();
        let capacity = window.len();
        let len = self.lld.read(addr, window);
        trace!("EP{} OUT {}", addr.index(), len);

        if len > capacity {
            warn!("EP{} OUT overrun {} > {}", addr.index(), len, capacity);
            ep.out_packet_received(capacity);
            let (buffer, len) = ep.complete();
            return Received::Complete {
                buffer,
                len,
                overrun: true,
            };
        }

        match ep.out_packet_received(len) {
            Progress::Continue => {
                self.kick(addr);
                Received::Pending
            }
            Progress::Complete => {
                let (buffer, len) = ep.complete();
                Received::Complete {
                    buffer,
                    len,
                    overrun: false,
                }
            }
        }
    }

    /// (Re)enable both directions of EP0
    fn init_control_endpoints(&mut self) {
        for direction in [UsbDirection::Out, UsbDirection::In] {
            let config =
                EndpointConfig::new(ep0(direction), EndpointType::Control, self.ep0_max_packet_size);
            let ep = self.endpoints.endpoint_mut(config.address());
            ep.disable();
            ep.enable(config);
            self.lld.init_endpoint(&config);
        }
    }

    /// Disable every endpoint, and forget the address and configuration
    fn clear(&mut self) {
        for ep in self.endpoints.iter_mut() {
            ep.disable();
        }
        self.control = Control::new();
        self.address = 0;
        self.configuration = 0;
        self.status.remove(DeviceStatus::REMOTE_WAKEUP);
        self.suspended = false;
    }
}

/// A USB device driver
///
/// After you allocate a `Driver` with [`new()`](Driver::new), you must
///
/// - call [`initialize()`](Driver::initialize) once
/// - call [`start()`](Driver::start) to connect to the bus
/// - call [`poll()`](Driver::poll) whenever the USB interrupt fires
pub struct Driver<'a, L, C> {
    pub(crate) usb: Usb<'a, L>,
    pub(crate) callbacks: C,
}

impl<'a, L: LowLevel, C: Callbacks<'a, L>> Driver<'a, L, C> {
    /// Create a new `Driver`
    ///
    /// Creation does nothing except for take ownership of the low-level
    /// driver and the callbacks. The device starts `Uninit`.
    pub fn new(lld: L, callbacks: C, config: Config) -> Self {
        Driver {
            usb: Usb::new(lld, config),
            callbacks,
        }
    }

    pub fn usb(&self) -> &Usb<'a, L> {
        &self.usb
    }

    pub fn usb_mut(&mut self) -> &mut Usb<'a, L> {
        &mut self.usb
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Release the low-level driver and the callbacks
    pub fn release(self) -> (L, C) {
        (self.usb.lld, self.callbacks)
    }

    /// Initialize the low-level driver
    ///
    /// Moves the device from `Uninit` to `Stop`. You may only do this once.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.usb.state != DeviceState::Uninit {
            return Err(Error::AlreadyInitialized);
        }
        self.usb.lld.init();
        self.usb.state = DeviceState::Stop;
        debug!("INITIALIZED");
        Ok(())
    }

    /// Connect to the bus
    ///
    /// Moves the device from `Stop` to `Ready`. Starting a `Ready` device does
    /// nothing. Returns [`Error::InvalidState`] if the device already has an
    /// address.
    ///
    /// # Panics
    ///
    /// Panics if the driver isn't initialized.
    pub fn start(&mut self) -> Result<(), Error> {
        match self.usb.state {
            DeviceState::Uninit => panic!("Driver started before initialization"),
            DeviceState::Stop => {
                self.usb.lld.start();
                self.usb.init_control_endpoints();
                self.usb.state = DeviceState::Ready;
                debug!("STARTED");
                Ok(())
            }
            DeviceState::Ready => Ok(()),
            DeviceState::Selected | DeviceState::Active => Err(Error::InvalidState),
        }
    }

    /// Disconnect from the bus
    ///
    /// Every endpoint is disabled, and pending transfers are cancelled without
    /// running their callbacks. The address and configuration reset.
    ///
    /// `Uninit` is the one state that doesn't move to `Stop`: stopping an
    /// uninitialized driver does nothing, so that
    /// [`initialize()`](Driver::initialize) still runs afterwards.
    pub fn stop(&mut self) {
        if self.usb.state == DeviceState::Uninit {
            return;
        }
        self.usb.clear();
        self.usb.lld.disable_endpoints();
        self.usb.lld.stop();
        self.usb.state = DeviceState::Stop;
        debug!("STOPPED");
    }

    /// Handle all events pending in the low-level driver
    ///
    /// Returns `true` if there was at least one event.
    pub fn poll(&mut self) -> bool {
        let mut handled = false;
        while let Some(interrupt) = self.usb.lld.poll() {
            handled = true;
            self.dispatch(interrupt);
        }
        handled
    }

    /// Handle one event from the low-level driver
    ///
    /// Use this if your low-level driver delivers events itself, instead of
    /// through [`LowLevel::poll()`]. Events are discarded while the device is
    /// stopped.
    pub fn dispatch(&mut self, interrupt: Interrupt) {
        if self.usb.state < DeviceState::Ready {
            warn!("Event while stopped");
            return;
        }
        match interrupt {
            Interrupt::Reset => self.bus_reset(),
            Interrupt::Suspend => {
                self.usb.suspended = true;
                debug!("SUSPEND");
                self.callbacks.event(&mut self.usb, Event::Suspend);
            }
            Interrupt::Wakeup => {
                self.usb.suspended = false;
                debug!("WAKEUP");
                self.callbacks.event(&mut self.usb, Event::Wakeup);
            }
            Interrupt::Sof(frame) => self.callbacks.sof(&mut self.usb, frame),
            Interrupt::Setup => self.control_setup(),
            Interrupt::InComplete(0) => self.control_in(),
            Interrupt::OutComplete(0) => self.control_out(),
            Interrupt::InComplete(number) => self.endpoint_in(number),
            Interrupt::OutComplete(number) => self.endpoint_out(number),
            Interrupt::TransferError(addr) => {
                error!("EP{} {} ERROR", addr.index(), u8::from(addr));
                self.callbacks
                    .event(&mut self.usb, Event::TransferError(addr));
            }
        }
    }

    fn bus_reset(&mut self) {
        self.usb.clear();
        self.usb.lld.disable_endpoints();
        self.usb.lld.set_address(0);
        self.usb.init_control_endpoints();
        self.usb.state = DeviceState::Ready;
        debug!("RESET");
        self.callbacks.event(&mut self.usb, Event::Reset);
    }

    fn endpoint_in(&mut self, number: u8) {
        let addr = EndpointAddress::from_parts(number.into(), UsbDirection::In);
        if let Some((buffer, len)) = self.usb.advance_in(addr) {
            trace!("EP{} IN DONE {}", number, len);
            let _ = len;
            if let Buffer::In(data) = buffer {
                self.callbacks.in_complete(&mut self.usb, addr, data);
            }
        }
    }

    fn endpoint_out(&mut self, number: u8) {
        let addr = EndpointAddress::from_parts(number.into(), UsbDirection::Out);
        if let Received::Complete {
            buffer,
            len,
            overrun,
        } = self.usb.advance_out(addr)
        {
            trace!("EP{} OUT DONE {}", number, len);
            if overrun {
                self.callbacks
                    .event(&mut self.usb, Event::TransferError(addr));
            }
            if let Buffer::Out(data) = buffer {
                self.callbacks.out_complete(&mut self.usb, addr, data, len);
            }
        }
    }
}
