//! Endpoint 0 control transfers
//!
//! A control transfer moves through SETUP, an optional DATA stage, and a
//! STATUS stage. Both EP0 directions use the same transaction state machine as
//! every other endpoint; this module decides what each direction does next.

use crate::{
    callbacks::{Callbacks, ControlReply, Event},
    driver::{DeviceState, Driver, Received, Usb},
    endpoint::{ep0, Buffer},
    lld::LowLevel,
    setup::{Recipient, SetupPacket},
    standard,
};
use usb_device::{control::Request, endpoint::EndpointAddress, UsbDirection};

/// The stage of a control transfer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ControlStage {
    /// Waiting for a setup packet
    Idle,
    /// Sending the reply to the host
    DataIn,
    /// Receiving data from the host
    DataOut,
    /// Sending the zero-length status packet
    StatusIn,
    /// Waiting for the host's zero-length status packet
    StatusOut,
}

/// Who answered the setup packet
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Owner {
    /// The driver's standard request handler
    Standard,
    /// The application's [`request_hook()`](crate::Callbacks::request_hook)
    Hook,
    /// The application's [`get_descriptor()`](crate::Callbacks::get_descriptor)
    Descriptor,
}

/// What to do with a setup packet
pub(crate) enum Reply<'a> {
    In(&'a [u8]),
    Out(&'a mut [u8]),
    /// Send the first `n` bytes held in the control context
    Data(usize),
    Ack,
    Stall,
}

impl<'a> From<ControlReply<'a>> for Reply<'a> {
    fn from(reply: ControlReply<'a>) -> Self {
        match reply {
            ControlReply::In(data) => Reply::In(data),
            ControlReply::Out(data) => Reply::Out(data),
            ControlReply::Ack => Reply::Ack,
            ControlReply::Stall => Reply::Stall,
        }
    }
}

/// The control transfer context
///
/// There's at most one per device.
pub(crate) struct Control {
    stage: ControlStage,
    setup: Option<SetupPacket>,
    owner: Option<Owner>,
    /// Reply bytes for the standard requests
    data: [u8; 2],
    /// Address from SET_ADDRESS, waiting for the status stage
    pub(crate) pending_address: Option<u8>,
    /// EP0 is stalled until the next setup packet
    stalled: bool,
}

impl Control {
    pub const fn new() -> Self {
        Control {
            stage: ControlStage::Idle,
            setup: None,
            owner: None,
            data: [0; 2],
            pending_address: None,
            stalled: false,
        }
    }

    pub fn stage(&self) -> ControlStage {
        self.stage
    }

    pub fn owner(&self) -> Option<Owner> {
        self.owner
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Hold a short standard reply
    pub fn reply(&mut self, bytes: &[u8]) -> Reply<'static> {
        let len = bytes.len().min(self.data.len());
        self.data[..len].copy_from_slice(&bytes[..len]);
        Reply::Data(len)
    }

    /// Back to IDLE, forgetting the setup packet
    fn reset(&mut self) {
        self.stage = ControlStage::Idle;
        self.setup = None;
        self.owner = None;
        self.pending_address = None;
    }
}

impl<'a, L: LowLevel> Usb<'a, L> {
    /// Drop the control transfer, and any EP0 transaction
    fn abort_control(&mut self) {
        for direction in [UsbDirection::Out, UsbDirection::In] {
            if let Some(ep) = self.endpoints.get_mut(ep0(direction)) {
                ep.cancel();
            }
        }
        self.control.reset();
    }

    /// Reject the control transfer
    ///
    /// The stall holds until the next setup packet.
    pub(crate) fn stall_control(&mut self) {
        self.abort_control();
        self.lld.stall_endpoint(ep0(UsbDirection::Out));
        self.lld.stall_endpoint(ep0(UsbDirection::In));
        self.control.stalled = true;
        debug!("STALL EP0");
    }

    /// Start the stage that follows SETUP
    ///
    /// Returns `false` if the transfer stalled.
    fn begin_control(&mut self, setup: &SetupPacket, reply: Reply<'a>, owner: Owner) -> bool {
        let length = setup.length() as usize;
        self.control.owner = Some(owner);

        if let Reply::Stall = reply {
            self.stall_control();
            return false;
        }
        if length == 0 {
            self.status_in();
            return true;
        }

        match (setup.direction(), reply) {
            (UsbDirection::In, Reply::In(data)) => {
                let len = data.len().min(length);
                self.data_in(Buffer::In(data), len, length)
            }
            (UsbDirection::In, Reply::Data(len)) => {
                self.data_in(Buffer::Control, len.min(length), length)
            }
            (UsbDirection::In, Reply::Ack) => self.data_in(Buffer::None, 0, length),
            (UsbDirection::Out, Reply::Out(data)) => {
                if data.len() < length {
                    warn!("Control OUT buffer {} < wLength {}", data.len(), length);
                    self.stall_control();
                    return false;
                }
                self.data_out(data, length)
            }
            _ => {
                warn!("Control reply doesn't match the request direction");
                self.stall_control();
                return false;
            }
        }
        true
    }

    /// Send `len` bytes of `buffer`, and expect the host's status packet
    fn data_in(&mut self, buffer: Buffer<'a>, len: usize, length: usize) {
        let addr = ep0(UsbDirection::In);
        // A short reply ends with a short packet, even a zero-length one
        let send_zlp = len < length;
        self.prepare_ep0(addr, buffer, len, send_zlp);
        self.control.stage = ControlStage::DataIn;
        self.kick(addr);

        // The host may end the data stage early with its status packet
        let addr = ep0(UsbDirection::Out);
        self.prepare_ep0(addr, Buffer::None, 0, false);
        self.kick(addr);
    }

    fn data_out(&mut self, data: &'a mut [u8], len: usize) {
        let addr = ep0(UsbDirection::Out);
        self.prepare_ep0(addr, Buffer::Out(data), len, false);
        self.control.stage = ControlStage::DataOut;
        self.kick(addr);
    }

    fn status_in(&mut self) {
        let addr = ep0(UsbDirection::In);
        self.prepare_ep0(addr, Buffer::None, 0, false);
        self.control.stage = ControlStage::StatusIn;
        self.kick(addr);
    }

    fn prepare_ep0(
        &mut self,
        addr: EndpointAddress,
        buffer: Buffer<'a>,
        len: usize,
        send_zlp: bool,
    ) {
        let ep = self.endpoints.endpoint_mut(addr);
        ep.cancel();
        // Cancelled just above, so the endpoint is idle.
        let _ = ep.prepare(buffer, len, send_zlp);
        ep.start();
    }

    /// The status stage finished
    ///
    /// Applies a pending address. Returns the event to report, if any.
    fn end_control(&mut self) -> Option<Event> {
        let address = self.control.pending_address.take();
        self.abort_control();

        let address = address?;
        self.lld.set_address(address);
        self.address = address;
        self.state = if address == 0 {
            DeviceState::Ready
        } else {
            DeviceState::Selected
        };
        debug!("ADDRESS {}", address);
        Some(Event::Address)
    }
}

impl<'a, L: LowLevel, C: Callbacks<'a, L>> Driver<'a, L, C> {
    /// A setup packet arrived
    pub(crate) fn control_setup(&mut self) {
        let setup = SetupPacket::from_bytes(self.usb.lld.read_setup());
        trace!(
            "SETUP {} {} {} {} {}",
            setup.bm_request_type(),
            setup.request(),
            setup.value(),
            setup.index(),
            setup.length()
        );

        if self.usb.control.stage != ControlStage::Idle {
            warn!("SETUP during a control transfer");
        }
        self.usb.abort_control();
        if core::mem::take(&mut self.usb.control.stalled) {
            self.usb.lld.clear_stall(ep0(UsbDirection::Out));
            self.usb.lld.clear_stall(ep0(UsbDirection::In));
        }
        self.usb.control.setup = Some(setup);

        if !self.route(&setup) {
            self.callbacks.event(&mut self.usb, Event::Stalled);
        }
    }

    /// First match wins: the hook, then descriptors, then standard requests
    fn route(&mut self, setup: &SetupPacket) -> bool {
        if let Some(reply) = self.callbacks.request_hook(&mut self.usb, setup) {
            return self.usb.begin_control(setup, reply.into(), Owner::Hook);
        }

        if setup.is_standard(Request::GET_DESCRIPTOR)
            && setup.direction() == UsbDirection::In
            && matches!(setup.recipient(), Recipient::Device | Recipient::Interface)
        {
            let (kind, index) = setup.descriptor_type_index();
            let reply = match self
                .callbacks
                .get_descriptor(&mut self.usb, kind, index, setup.index())
            {
                Some(descriptor) => Reply::In(descriptor),
                None => {
                    debug!("NO DESCRIPTOR {} {}", kind, index);
                    Reply::Stall
                }
            };
            return self.usb.begin_control(setup, reply, Owner::Descriptor);
        }

        let handled = standard::handle(&mut self.usb, setup);
        let accepted = self.usb.begin_control(setup, handled.reply, Owner::Standard);
        if let (true, Some(event)) = (accepted, handled.event) {
            self.callbacks.event(&mut self.usb, event);
        }
        accepted
    }

    /// EP0 IN packet sent
    pub(crate) fn control_in(&mut self) {
        let addr = ep0(UsbDirection::In);
        let stage = self.usb.control.stage;
        if self.usb.advance_in(addr).is_none() {
            return;
        }
        match stage {
            // The status OUT is already primed
            ControlStage::DataIn => self.usb.control.stage = ControlStage::StatusOut,
            ControlStage::StatusIn => {
                if let Some(event) = self.usb.end_control() {
                    self.callbacks.event(&mut self.usb, event);
                }
            }
            _ => {
                warn!("EP0 IN complete out of sequence");
                self.stall();
            }
        }
    }

    /// EP0 OUT packet received
    pub(crate) fn control_out(&mut self) {
        let addr = ep0(UsbDirection::Out);
        let stage = self.usb.control.stage;
        let (buffer, len) = match self.usb.advance_out(addr) {
            Received::Spurious | Received::Pending => return,
            Received::Complete { overrun: true, .. } => {
                warn!("EP0 OUT overrun");
                self.stall();
                return;
            }
            Received::Complete { buffer, len, .. } => (buffer, len),
        };

        match stage {
            ControlStage::DataOut => {
                let accepted = match (buffer, self.usb.control.setup, self.usb.control.owner) {
                    (Buffer::Out(data), Some(setup), Some(Owner::Hook)) => {
                        self.callbacks.control_out(&mut self.usb, &setup, data, len)
                    }
                    _ => false,
                };
                if accepted {
                    self.usb.status_in();
                } else {
                    self.stall();
                }
            }
            // Status stage, possibly ending a data stage early
            ControlStage::DataIn | ControlStage::StatusOut => {
                if let Some(event) = self.usb.end_control() {
                    self.callbacks.event(&mut self.usb, event);
                }
            }
            _ => {
                warn!("EP0 OUT complete out of sequence");
                self.stall();
            }
        }
    }

    fn stall(&mut self) {
        self.usb.stall_control();
        self.callbacks.event(&mut self.usb, Event::Stalled);
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlStage, Owner};
    use crate::{
        callbacks::{ControlReply, Event},
        driver::DeviceState,
        mock::{self, Call},
        SetupPacket,
    };
    use std::{boxed::Box, vec, vec::Vec};
    use usb_device::{endpoint::EndpointAddress, UsbDirection};

    fn ep0_in() -> EndpointAddress {
        EndpointAddress::from_parts(0, UsbDirection::In)
    }

    fn ep0_out() -> EndpointAddress {
        EndpointAddress::from_parts(0, UsbDirection::Out)
    }

    const GET_DEVICE_DESCRIPTOR: [u8; 8] = [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00];

    #[test]
    fn set_address_after_status() {
        let mut driver = mock::ready();
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x00, 0x05, 0x2A, 0x00, 0x00, 0x00, 0x00, 0x00]);
        driver.poll();

        // Status ZLP queued, but not yet sent
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusIn);
        assert_eq!(driver.usb().address(), 0);
        assert_eq!(driver.usb().state(), DeviceState::Ready);
        assert!(!driver
            .usb()
            .lld()
            .calls
            .iter()
            .any(|call| matches!(call, Call::SetAddress(42))));
        assert_eq!(driver.usb().lld().transmitted(ep0_in()), [[0u8; 0]]);

        driver.usb_mut().lld_mut().in_done(0);
        driver.poll();
        assert_eq!(driver.usb().address(), 42);
        assert_eq!(driver.usb().state(), DeviceState::Selected);
        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);
        assert!(driver.usb().lld().calls.contains(&Call::SetAddress(42)));
        assert_eq!(driver.callbacks().events, vec![Event::Reset, Event::Address]);
    }

    #[test]
    fn get_descriptor_truncated() {
        let mut driver = mock::ready();
        // Ask for 8 bytes of an 18 byte descriptor
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x08, 0x00]);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::DataIn);
        assert_eq!(driver.usb().control_owner(), Some(Owner::Descriptor));
        assert!(driver.usb().lld().calls.contains(&Call::Receive(ep0_out(), 0)));

        driver.usb_mut().lld_mut().in_done(0);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusOut);
        driver.usb_mut().lld_mut().out_packet(0, &[]);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);

        let sent = driver.usb().lld().transmitted(ep0_in());
        assert_eq!(sent, vec![mock::DEVICE_DESCRIPTOR[..8].to_vec()]);
    }

    #[test]
    fn get_descriptor_multi_packet() {
        let mut driver = mock::ready_with(crate::Config::new().ep0_max_packet_size(8));
        driver.usb_mut().lld_mut().setup(GET_DEVICE_DESCRIPTOR);
        driver.poll();
        for _ in 0..3 {
            driver.usb_mut().lld_mut().in_done(0);
            driver.poll();
        }
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusOut);

        // 18 < 64, and the last packet is short, so there's no ZLP
        let sent = driver.usb().lld().transmitted(ep0_in());
        let sizes: Vec<usize> = sent.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![8, 8, 2]);
        assert_eq!(sent.concat(), mock::DEVICE_DESCRIPTOR.to_vec());
    }

    #[test]
    fn short_reply_on_packet_boundary() {
        static REPLY: [u8; 16] = [0xEE; 16];
        let mut driver = mock::ready_with(crate::Config::new().ep0_max_packet_size(8));
        driver.callbacks_mut().hook = Some(|_, _| Some(ControlReply::In(&REPLY)));
        driver
            .usb_mut()
            .lld_mut()
            .setup([0xC0, 0x01, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00]);
        driver.poll();
        for _ in 0..3 {
            driver.usb_mut().lld_mut().in_done(0);
            driver.poll();
        }

        let sent = driver.usb().lld().transmitted(ep0_in());
        let sizes: Vec<usize> = sent.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![8, 8, 0]);
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusOut);
    }

    #[test]
    fn host_ends_data_stage_early() {
        let mut driver = mock::ready_with(crate::Config::new().ep0_max_packet_size(8));
        driver.usb_mut().lld_mut().setup(GET_DEVICE_DESCRIPTOR);
        driver.poll();
        driver.usb_mut().lld_mut().in_done(0);
        driver.usb_mut().lld_mut().out_packet(0, &[]);
        driver.poll();

        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);
        assert_eq!(driver.usb().lld().transmitted(ep0_in()).len(), 2);
        assert!(!driver.callbacks().events.contains(&Event::Stalled));
    }

    #[test]
    fn missing_descriptor_stalls() {
        let mut driver = mock::ready();
        // String descriptor 3
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x80, 0x06, 0x03, 0x03, 0x09, 0x04, 0xFF, 0x00]);
        driver.poll();
        let calls = &driver.usb().lld().calls;
        assert!(calls.contains(&Call::Stall(ep0_in())));
        assert!(calls.contains(&Call::Stall(ep0_out())));
        assert_eq!(driver.callbacks().events.last(), Some(&Event::Stalled));
        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);
    }

    #[test]
    fn unclaimed_class_request_stalls() {
        let mut driver = mock::active();
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x21, 0x20, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00]);
        driver.poll();
        assert!(driver.usb().lld().calls.contains(&Call::Stall(ep0_in())));
        assert_eq!(driver.callbacks().events.last(), Some(&Event::Stalled));
    }

    #[test]
    fn stall_clears_on_next_setup() {
        let mut driver = mock::active();
        driver
            .usb_mut()
            .lld_mut()
            .setup([0xA1, 0x01, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00]);
        driver.poll();
        driver.usb_mut().lld_mut().take_calls();

        driver
            .usb_mut()
            .lld_mut()
            .setup([0x80, 0x08, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
        driver.poll();
        let calls = driver.usb_mut().lld_mut().take_calls();
        assert_eq!(calls[0], Call::ClearStall(ep0_out()));
        assert_eq!(calls[1], Call::ClearStall(ep0_in()));
        assert_eq!(driver.usb().control_stage(), ControlStage::DataIn);
    }

    #[test]
    fn hook_takes_precedence() {
        static OVERRIDE: [u8; 4] = [1, 2, 3, 4];
        let mut driver = mock::ready();
        driver.callbacks_mut().hook = Some(|_, setup: &SetupPacket| {
            (setup.request() == 0x06).then_some(ControlReply::In(&OVERRIDE))
        });
        driver.usb_mut().lld_mut().setup(GET_DEVICE_DESCRIPTOR);
        driver.poll();

        assert_eq!(driver.usb().control_owner(), Some(Owner::Hook));
        assert_eq!(
            driver.usb().lld().transmitted(ep0_in()),
            vec![OVERRIDE.to_vec()]
        );
    }

    #[test]
    fn hook_out_data() {
        let mut driver = mock::active();
        driver.callbacks_mut().hook = Some(|_, _| {
            let buffer = Box::leak(vec![0u8; 16].into_boxed_slice());
            Some(ControlReply::Out(buffer))
        });
        driver.usb_mut().lld_mut().take_calls();
        // SET_LINE_CODING, 7 bytes
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x21, 0x20, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00]);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::DataOut);
        assert!(driver.usb().lld().calls.contains(&Call::Receive(ep0_out(), 7)));

        let line_coding = [0x00, 0xC2, 0x01, 0x00, 0x00, 0x00, 0x08];
        driver.usb_mut().lld_mut().out_packet(0, &line_coding);
        driver.poll();
        assert_eq!(driver.callbacks().control_out, vec![line_coding.to_vec()]);
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusIn);
        assert_eq!(driver.usb().lld().transmitted(ep0_in()), [[0u8; 0]]);

        driver.usb_mut().lld_mut().in_done(0);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);
    }

    #[test]
    fn rejected_out_data_stalls() {
        let mut driver = mock::active();
        driver.callbacks_mut().accept_control_out = false;
        driver.callbacks_mut().hook = Some(|_, _| {
            let buffer = Box::leak(vec![0u8; 4].into_boxed_slice());
            Some(ControlReply::Out(buffer))
        });
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x41, 0x10, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00]);
        driver.usb_mut().lld_mut().out_packet(0, &[1, 2, 3, 4]);
        driver.poll();
        assert!(driver.usb().lld().calls.contains(&Call::Stall(ep0_in())));
        assert_eq!(driver.callbacks().events.last(), Some(&Event::Stalled));
    }

    #[test]
    fn out_overrun_stalls() {
        let mut driver = mock::active();
        driver.callbacks_mut().hook = Some(|_, _| {
            let buffer = Box::leak(vec![0u8; 2].into_boxed_slice());
            Some(ControlReply::Out(buffer))
        });
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x41, 0x10, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00]);
        driver.usb_mut().lld_mut().out_packet(0, &[0; 8]);
        driver.poll();
        assert!(driver.callbacks().control_out.is_empty());
        assert_eq!(driver.callbacks().events.last(), Some(&Event::Stalled));
    }

    #[test]
    fn short_out_buffer_stalls() {
        let mut driver = mock::active_with(crate::Config::new().ep0_max_packet_size(8));
        driver.callbacks_mut().hook = Some(|_, _| {
            let buffer = Box::leak(vec![0u8; 8].into_boxed_slice());
            Some(ControlReply::Out(buffer))
        });
        driver.usb_mut().lld_mut().take_calls();
        // Two packets announced, one packet of room
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x41, 0x10, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00]);
        driver.usb_mut().lld_mut().out_packet(0, &[1; 8]);
        driver.poll();

        assert!(driver.usb().lld().calls.contains(&Call::Stall(ep0_in())));
        assert!(driver.callbacks().control_out.is_empty());
        assert_eq!(driver.callbacks().events.last(), Some(&Event::Stalled));
        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);
    }

    #[test]
    fn mismatched_reply_stalls() {
        static DATA: [u8; 2] = [0; 2];
        let mut driver = mock::active();
        driver.callbacks_mut().hook = Some(|_, _| Some(ControlReply::In(&DATA)));
        // An OUT request with a data stage can't be answered with IN data
        driver
            .usb_mut()
            .lld_mut()
            .setup([0x41, 0x10, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
        driver.poll();
        assert_eq!(driver.callbacks().events.last(), Some(&Event::Stalled));
    }

    #[test]
    fn empty_in_reply_sends_zlp() {
        let mut driver = mock::active();
        driver.callbacks_mut().hook = Some(|_, _| Some(ControlReply::In(&[])));
        driver.usb_mut().lld_mut().take_calls();
        driver
            .usb_mut()
            .lld_mut()
            .setup([0xC0, 0x01, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00]);
        driver.poll();
        assert_eq!(driver.usb().lld().transmitted(ep0_in()), [[0u8; 0]]);
        driver.usb_mut().lld_mut().in_done(0);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusOut);
    }

    #[test]
    fn setup_restarts_transfer() {
        let mut driver = mock::ready_with(crate::Config::new().ep0_max_packet_size(8));
        driver.usb_mut().lld_mut().setup(GET_DEVICE_DESCRIPTOR);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::DataIn);

        driver
            .usb_mut()
            .lld_mut()
            .setup([0x00, 0x05, 0x09, 0x00, 0x00, 0x00, 0x00, 0x00]);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::StatusIn);
        assert_eq!(driver.usb().control_owner(), Some(Owner::Standard));
    }

    #[test]
    fn stray_ep0_completions_are_ignored() {
        let mut driver = mock::ready();
        driver.usb_mut().lld_mut().in_done(0);
        driver.usb_mut().lld_mut().out_packet(0, &[]);
        driver.poll();
        assert_eq!(driver.usb().control_stage(), ControlStage::Idle);
        assert_eq!(driver.callbacks().events, vec![Event::Reset]);
    }
}
