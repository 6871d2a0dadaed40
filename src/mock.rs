//! A recording low-level driver, and a recording application

use crate::{
    callbacks::{Callbacks, ControlReply, Event},
    driver::Usb,
    endpoint::EndpointConfig,
    lld::{Interrupt, LowLevel},
    setup::SetupPacket,
    Config, Driver,
};
use std::{collections::VecDeque, vec::Vec};
use usb_device::{endpoint::EndpointAddress, UsbDirection};

/// One call into the low-level driver
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Call {
    Init,
    Start,
    Stop,
    SetAddress(u8),
    InitEndpoint(EndpointAddress),
    DisableEndpoints,
    Transmit(EndpointAddress, Vec<u8>),
    Receive(EndpointAddress, usize),
    Stall(EndpointAddress),
    ClearStall(EndpointAddress),
    RemoteWakeup,
}

#[derive(Default)]
pub struct Mock {
    pub calls: Vec<Call>,
    interrupts: VecDeque<Interrupt>,
    setups: VecDeque<[u8; 8]>,
    packets: VecDeque<(EndpointAddress, Vec<u8>)>,
}

impl Mock {
    /// Queue a setup packet
    pub fn setup(&mut self, setup: [u8; 8]) {
        self.setups.push_back(setup);
        self.interrupts.push_back(Interrupt::Setup);
    }

    /// Queue an OUT packet from the host
    pub fn out_packet(&mut self, number: u8, data: &[u8]) {
        let addr = EndpointAddress::from_parts(number.into(), UsbDirection::Out);
        self.packets.push_back((addr, data.to_vec()));
        self.interrupts.push_back(Interrupt::OutComplete(number));
    }

    /// Report that the last IN packet was sent
    pub fn in_done(&mut self, number: u8) {
        self.interrupts.push_back(Interrupt::InComplete(number));
    }

    pub fn raise(&mut self, interrupt: Interrupt) {
        self.interrupts.push_back(interrupt);
    }

    /// Every packet handed to `transmit()` on this endpoint
    pub fn transmitted(&self, addr: EndpointAddress) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Transmit(a, data) if *a == addr => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        core::mem::take(&mut self.calls)
    }
}

impl LowLevel for Mock {
    fn init(&mut self) {
        self.calls.push(Call::Init);
    }
    fn start(&mut self) {
        self.calls.push(Call::Start);
    }
    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }
    fn set_address(&mut self, address: u8) {
        self.calls.push(Call::SetAddress(address));
    }
    fn init_endpoint(&mut self, config: &EndpointConfig) {
        self.calls.push(Call::InitEndpoint(config.address()));
    }
    fn disable_endpoints(&mut self) {
        self.calls.push(Call::DisableEndpoints);
    }
    fn transmit(&mut self, addr: EndpointAddress, packet: &[u8]) {
        self.calls.push(Call::Transmit(addr, packet.to_vec()));
    }
    fn receive(&mut self, addr: EndpointAddress, max_len: usize) {
        self.calls.push(Call::Receive(addr, max_len));
    }
    fn read(&mut self, addr: EndpointAddress, buffer: &mut [u8]) -> usize {
        let Some(position) = self.packets.iter().position(|(a, _)| *a == addr) else {
            return 0;
        };
        let (_, packet) = self.packets.remove(position).unwrap();
        let len = packet.len().min(buffer.len());
        buffer[..len].copy_from_slice(&packet[..len]);
        packet.len()
    }
    fn read_setup(&mut self) -> [u8; 8] {
        self.setups.pop_front().unwrap()
    }
    fn stall_endpoint(&mut self, addr: EndpointAddress) {
        self.calls.push(Call::Stall(addr));
    }
    fn clear_stall(&mut self, addr: EndpointAddress) {
        self.calls.push(Call::ClearStall(addr));
    }
    fn poll(&mut self) -> Option<Interrupt> {
        self.interrupts.pop_front()
    }
    fn remote_wakeup(&mut self) {
        self.calls.push(Call::RemoteWakeup);
    }
}

pub static DEVICE_DESCRIPTOR: [u8; 18] = [
    18, 1, 0x00, 0x02, 0, 0, 0, 64, 0x09, 0x12, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 1,
];

pub type Hook = fn(&mut Usb<'static, Mock>, &SetupPacket) -> Option<ControlReply<'static>>;

/// Records everything the driver reports
pub struct App {
    pub events: Vec<Event>,
    pub in_done: Vec<(EndpointAddress, usize)>,
    pub out_done: Vec<(EndpointAddress, Vec<u8>)>,
    pub control_out: Vec<Vec<u8>>,
    pub sofs: Vec<u16>,
    pub hook: Option<Hook>,
    pub accept_control_out: bool,
    pub on_configured: Option<fn(&mut Usb<'static, Mock>)>,
}

impl Default for App {
    fn default() -> Self {
        App {
            events: Vec::new(),
            in_done: Vec::new(),
            out_done: Vec::new(),
            control_out: Vec::new(),
            sofs: Vec::new(),
            hook: None,
            accept_control_out: true,
            on_configured: None,
        }
    }
}

impl Callbacks<'static, Mock> for App {
    fn event(&mut self, usb: &mut Usb<'static, Mock>, event: Event) {
        self.events.push(event);
        if let (Event::Configured, Some(on_configured)) = (event, self.on_configured) {
            on_configured(usb);
        }
    }

    fn request_hook(
        &mut self,
        usb: &mut Usb<'static, Mock>,
        setup: &SetupPacket,
    ) -> Option<ControlReply<'static>> {
        self.hook.and_then(|hook| hook(usb, setup))
    }

    fn get_descriptor(
        &mut self,
        _: &mut Usb<'static, Mock>,
        kind: u8,
        index: u8,
        _: u16,
    ) -> Option<&'static [u8]> {
        (kind == 1 && index == 0).then_some(&DEVICE_DESCRIPTOR[..])
    }

    fn control_out(
        &mut self,
        _: &mut Usb<'static, Mock>,
        _: &SetupPacket,
        data: &'static mut [u8],
        len: usize,
    ) -> bool {
        self.control_out.push(data[..len].to_vec());
        self.accept_control_out
    }

    fn in_complete(&mut self, _: &mut Usb<'static, Mock>, addr: EndpointAddress, data: &'static [u8]) {
        self.in_done.push((addr, data.len()));
    }

    fn out_complete(
        &mut self,
        _: &mut Usb<'static, Mock>,
        addr: EndpointAddress,
        data: &'static mut [u8],
        len: usize,
    ) {
        self.out_done.push((addr, data[..len].to_vec()));
    }

    fn sof(&mut self, _: &mut Usb<'static, Mock>, frame: u16) {
        self.sofs.push(frame);
    }
}

pub type TestDriver = Driver<'static, Mock, App>;

/// A driver that hasn't been initialized
pub fn driver() -> TestDriver {
    Driver::new(Mock::default(), App::default(), Config::new())
}

/// A driver that's been reset by the host
pub fn ready_with(config: Config) -> TestDriver {
    let mut driver = Driver::new(Mock::default(), App::default(), config);
    driver.initialize().unwrap();
    driver.start().unwrap();
    driver.usb_mut().lld_mut().raise(Interrupt::Reset);
    driver.poll();
    driver
}

pub fn ready() -> TestDriver {
    ready_with(Config::new())
}

/// Run a request that has no data stage through its status stage
fn no_data(driver: &mut TestDriver, request: u8, value: u8) {
    let lld = driver.usb_mut().lld_mut();
    lld.setup([0x00, request, value, 0x00, 0x00, 0x00, 0x00, 0x00]);
    lld.in_done(0);
    driver.poll();
}

/// A driver with the given address
pub fn addressed(address: u8) -> TestDriver {
    addressed_with(Config::new(), address)
}

fn addressed_with(config: Config, address: u8) -> TestDriver {
    let mut driver = ready_with(config);
    no_data(&mut driver, 0x05, address);
    assert_eq!(driver.usb().address(), address);
    driver
}

/// A driver in configuration 1
pub fn active() -> TestDriver {
    active_with(Config::new())
}

pub fn active_with(config: Config) -> TestDriver {
    let mut driver = addressed_with(config, 1);
    no_data(&mut driver, 0x09, 1);
    assert_eq!(driver.usb().configuration(), 1);
    driver
}
