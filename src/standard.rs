//! Standard device requests
//!
//! The driver answers these when the application's request hook passes.
//! GET_DESCRIPTOR never reaches this module; the descriptor callback owns it.

use crate::{
    callbacks::Event,
    control::Reply,
    driver::{DeviceState, DeviceStatus, Usb},
    endpoint::EndpointState,
    lld::LowLevel,
    setup::{Recipient, RequestType, SetupPacket},
};
use usb_device::{control::Request, endpoint::EndpointAddress, UsbDirection};

/// The standard handler's answer
pub(crate) struct Handled {
    pub reply: Reply<'static>,
    /// Reported once the reply is accepted
    pub event: Option<Event>,
}

impl From<Reply<'static>> for Handled {
    fn from(reply: Reply<'static>) -> Self {
        Handled { reply, event: None }
    }
}

fn stall() -> Handled {
    Reply::Stall.into()
}

fn ack() -> Handled {
    Reply::Ack.into()
}

/// Standard requests have a fixed direction, and the OUT requests never
/// carry data.
fn valid(setup: &SetupPacket, direction: UsbDirection) -> bool {
    setup.direction() == direction && (direction == UsbDirection::In || setup.length() == 0)
}

/// Handle a standard request
pub(crate) fn handle<L: LowLevel>(usb: &mut Usb<'_, L>, setup: &SetupPacket) -> Handled {
    if setup.request_type() != RequestType::Standard {
        return stall();
    }

    let handled = match (setup.recipient(), setup.request()) {
        (Recipient::Device, Request::GET_STATUS) if valid(setup, UsbDirection::In) => {
            usb.control.reply(&usb.status.bits().to_le_bytes()).into()
        }
        (Recipient::Interface, Request::GET_STATUS)
            if valid(setup, UsbDirection::In) && usb.state == DeviceState::Active =>
        {
            usb.control.reply(&[0, 0]).into()
        }
        (Recipient::Endpoint, Request::GET_STATUS) if valid(setup, UsbDirection::In) => {
            endpoint_status(usb, setup)
        }
        (Recipient::Device, Request::CLEAR_FEATURE) if valid(setup, UsbDirection::Out) => {
            device_feature(usb, setup, false)
        }
        (Recipient::Device, Request::SET_FEATURE) if valid(setup, UsbDirection::Out) => {
            device_feature(usb, setup, true)
        }
        (Recipient::Endpoint, Request::CLEAR_FEATURE) if valid(setup, UsbDirection::Out) => {
            endpoint_feature(usb, setup, false)
        }
        (Recipient::Endpoint, Request::SET_FEATURE) if valid(setup, UsbDirection::Out) => {
            endpoint_feature(usb, setup, true)
        }
        (Recipient::Device, Request::SET_ADDRESS) if valid(setup, UsbDirection::Out) => {
            set_address(usb, setup)
        }
        (Recipient::Device, Request::GET_CONFIGURATION) if valid(setup, UsbDirection::In) => {
            usb.control.reply(&[usb.configuration]).into()
        }
        (Recipient::Device, Request::SET_CONFIGURATION) if valid(setup, UsbDirection::Out) => {
            set_configuration(usb, setup)
        }
        (Recipient::Interface, Request::GET_INTERFACE)
            if valid(setup, UsbDirection::In) && usb.state == DeviceState::Active =>
        {
            usb.control.reply(&[0]).into()
        }
        (Recipient::Interface, Request::SET_INTERFACE)
            if valid(setup, UsbDirection::Out)
                && usb.state == DeviceState::Active
                && setup.value() == 0 =>
        {
            ack()
        }
        (Recipient::Endpoint, Request::SYNCH_FRAME)
            if valid(setup, UsbDirection::In) && usb.state == DeviceState::Active =>
        {
            usb.control.reply(&[0, 0]).into()
        }
        _ => stall(),
    };

    if let Reply::Stall = handled.reply {
        debug!(
            "STANDARD REQUEST {} {} UNSUPPORTED",
            setup.bm_request_type(),
            setup.request()
        );
    }
    handled
}

/// The endpoint named by `wIndex`
///
/// Only EP0 exists before the device is configured.
fn endpoint_address<L: LowLevel>(
    usb: &Usb<'_, L>,
    setup: &SetupPacket,
) -> Option<EndpointAddress> {
    let raw = u8::try_from(setup.index()).ok()?;
    let addr = EndpointAddress::from(raw);
    let enabled = usb
        .endpoints
        .get(addr)
        .is_some_and(|ep| ep.state() != EndpointState::Disabled);
    (addr.index() == 0 || (enabled && usb.state == DeviceState::Active)).then_some(addr)
}

fn endpoint_status<L: LowLevel>(usb: &mut Usb<'_, L>, setup: &SetupPacket) -> Handled {
    let Some(addr) = endpoint_address(usb, setup) else {
        return stall();
    };
    let halted = addr.index() != 0 && usb.endpoints.endpoint(addr).is_halted();
    usb.control.reply(&[halted as u8, 0]).into()
}

fn device_feature<L: LowLevel>(usb: &mut Usb<'_, L>, setup: &SetupPacket, set: bool) -> Handled {
    match setup.value() {
        Request::FEATURE_DEVICE_REMOTE_WAKEUP => {
            usb.status.set(DeviceStatus::REMOTE_WAKEUP, set);
            debug!("REMOTE WAKEUP {}", set);
            ack()
        }
        // TEST_MODE, and anything newer
        _ => stall(),
    }
}

fn endpoint_feature<L: LowLevel>(usb: &mut Usb<'_, L>, setup: &SetupPacket, set: bool) -> Handled {
    if setup.value() != Request::FEATURE_ENDPOINT_HALT {
        return stall();
    }
    let Some(addr) = endpoint_address(usb, setup) else {
        return stall();
    };
    // EP0 recovers on the next setup packet
    if addr.index() == 0 {
        return ack();
    }

    if set {
        usb.halt(addr);
    } else {
        usb.clear_halt(addr);
    }
    ack()
}

fn set_address<L: LowLevel>(usb: &mut Usb<'_, L>, setup: &SetupPacket) -> Handled {
    let address = setup.value();
    if address > 127 || setup.index() != 0 {
        return stall();
    }
    match usb.state {
        DeviceState::Ready | DeviceState::Selected => {
            usb.control.pending_address = Some(address as u8);
            ack()
        }
        _ => stall(),
    }
}

fn set_configuration<L: LowLevel>(usb: &mut Usb<'_, L>, setup: &SetupPacket) -> Handled {
    let Ok(configuration) = u8::try_from(setup.value()) else {
        return stall();
    };
    let was_active = match usb.state {
        DeviceState::Selected => false,
        DeviceState::Active => true,
        _ => return stall(),
    };

    usb.disable_nonzero_endpoints();
    usb.configuration = configuration;
    debug!("CONFIGURATION {}", configuration);

    let event = if configuration != 0 {
        usb.state = DeviceState::Active;
        Some(Event::Configured)
    } else {
        usb.state = DeviceState::Selected;
        was_active.then_some(Event::Unconfigured)
    };
    Handled {
        reply: Reply::Ack,
        event,
    }
}
