//! The endpoint table owned by a driver

use crate::endpoint::Endpoint;
use usb_device::{endpoint::EndpointAddress, UsbDirection};

/// The maximum supported number of endpoints.
///
/// Eight endpoints, two directions each.
pub const MAX_ENDPOINTS: usize = 8 * 2;

/// Produces an index into the endpoint table
///
/// Returns `None` for endpoint numbers that the table can't hold.
fn index(ep_addr: EndpointAddress) -> Option<usize> {
    (ep_addr.index() < MAX_ENDPOINTS / 2)
        .then(|| (ep_addr.index() * 2) + (UsbDirection::In == ep_addr.direction()) as usize)
}

/// All endpoints, both directions, including EP0.
///
/// All even indexes are OUT, and all odd indexes are IN.
pub(crate) struct Endpoints<'a>([Endpoint<'a>; MAX_ENDPOINTS]);

impl<'a> Endpoints<'a> {
    pub fn new() -> Self {
        Endpoints(core::array::from_fn(|_| Endpoint::new()))
    }

    /// Look up an endpoint that the host named
    ///
    /// Returns `None` if the address is out of range.
    pub fn get(&self, addr: EndpointAddress) -> Option<&Endpoint<'a>> {
        index(addr).map(|idx| &self.0[idx])
    }

    /// Look up an endpoint that the host named
    ///
    /// Returns `None` if the address is out of range.
    pub fn get_mut(&mut self, addr: EndpointAddress) -> Option<&mut Endpoint<'a>> {
        index(addr).map(|idx| &mut self.0[idx])
    }

    /// Acquire the endpoint
    ///
    /// # Panics
    ///
    /// Panics if the address is out of range. Use this when the address came
    /// from the application, or from the low-level driver.
    pub fn endpoint(&self, addr: EndpointAddress) -> &Endpoint<'a> {
        match self.get(addr) {
            Some(ep) => ep,
            None => panic!("EP{} doesn't exist", addr.index()),
        }
    }

    /// Acquire the mutable endpoint
    ///
    /// # Panics
    ///
    /// Panics if the address is out of range.
    pub fn endpoint_mut(&mut self, addr: EndpointAddress) -> &mut Endpoint<'a> {
        match self.get_mut(addr) {
            Some(ep) => ep,
            None => panic!("EP{} doesn't exist", addr.index()),
        }
    }

    /// Every endpoint except the control endpoint pair
    pub fn nonzero_endpoints_iter_mut(&mut self) -> impl Iterator<Item = &mut Endpoint<'a>> {
        self.0.iter_mut().skip(2)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Endpoint<'a>> {
        self.0.iter_mut()
    }
}
