//! Setup packet decoding

use usb_device::UsbDirection;

/// The type bits of `bmRequestType`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestType {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// The recipient bits of `bmRequestType`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
    /// Values 4 through 31
    Reserved,
}

/// An 8-byte setup packet
///
/// Captured once when the setup stage arrives. There are no setters; the
/// control transfer that decodes a packet sees the same value until it ends.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SetupPacket {
    request_type: u8,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
}

impl SetupPacket {
    /// Decode the packet as it appears on the wire
    pub const fn from_bytes(raw: [u8; 8]) -> Self {
        SetupPacket {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Encode the packet back into its wire format
    pub fn to_bytes(&self) -> [u8; 8] {
        let [v0, v1] = self.value.to_le_bytes();
        let [i0, i1] = self.index.to_le_bytes();
        let [l0, l1] = self.length.to_le_bytes();
        [self.request_type, self.request, v0, v1, i0, i1, l0, l1]
    }

    /// The raw `bmRequestType` field
    pub const fn bm_request_type(&self) -> u8 {
        self.request_type
    }

    /// Data stage direction
    ///
    /// Also the direction of the data stage when `length()` is zero, though
    /// there's no data stage in that case.
    pub fn direction(&self) -> UsbDirection {
        if self.request_type & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }

    pub fn request_type(&self) -> RequestType {
        match (self.request_type >> 5) & 0b11 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.request_type & 0b1_1111 {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        }
    }

    /// `bRequest`
    pub const fn request(&self) -> u8 {
        self.request
    }

    /// `wValue`
    pub const fn value(&self) -> u16 {
        self.value
    }

    /// `wIndex`
    pub const fn index(&self) -> u16 {
        self.index
    }

    /// `wLength`, the most the host will move in the data stage
    pub const fn length(&self) -> u16 {
        self.length
    }

    /// Returns `(descriptor type, descriptor index)` from `wValue`
    ///
    /// Only meaningful for GET_DESCRIPTOR and SET_DESCRIPTOR.
    pub const fn descriptor_type_index(&self) -> (u8, u8) {
        ((self.value >> 8) as u8, self.value as u8)
    }

    /// Indicates if this is the standard `request`
    pub fn is_standard(&self, request: u8) -> bool {
        self.request_type() == RequestType::Standard && self.request == request
    }
}
