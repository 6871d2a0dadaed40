//! Interrupt-safe driver sharing

use crate::{callbacks::Callbacks, driver::Driver, lld::LowLevel, Error};
use core::cell::RefCell;
use critical_section::Mutex;

/// A [`Driver`] shared between tasks and the USB interrupt
///
/// Every access runs in a critical section, so the interrupt handler can
/// [`poll()`](BusAdapter::poll) while a task queues transfers through
/// [`with_driver()`](BusAdapter::with_driver). Place it in a `static` to share
/// it with your interrupt handler.
pub struct BusAdapter<'a, L, C> {
    driver: Mutex<RefCell<Driver<'a, L, C>>>,
}

impl<'a, L: LowLevel, C: Callbacks<'a, L>> BusAdapter<'a, L, C> {
    /// Wrap a driver
    ///
    /// The driver may be in any state. Usually, you'll wrap it before you
    /// call [`initialize()`](BusAdapter::initialize).
    pub const fn new(driver: Driver<'a, L, C>) -> Self {
        BusAdapter {
            driver: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Interrupt-safe, mutable access to the driver
    ///
    /// # Panics
    ///
    /// Panics if `func` re-enters the adapter.
    pub fn with_driver<R>(&self, func: impl FnOnce(&mut Driver<'a, L, C>) -> R) -> R {
        critical_section::with(|cs| {
            let driver = self.driver.borrow(cs);
            let mut driver = driver.borrow_mut();
            func(&mut driver)
        })
    }

    /// Interrupt-safe, mutable access to the device state
    pub fn with_usb<R>(&self, func: impl FnOnce(&mut crate::Usb<'a, L>) -> R) -> R {
        self.with_driver(|driver| func(driver.usb_mut()))
    }

    pub fn initialize(&self) -> Result<(), Error> {
        self.with_driver(|driver| driver.initialize())
    }

    pub fn start(&self) -> Result<(), Error> {
        self.with_driver(|driver| driver.start())
    }

    pub fn stop(&self) {
        self.with_driver(|driver| driver.stop())
    }

    /// Handle all pending events
    ///
    /// Call this from your USB interrupt handler.
    pub fn poll(&self) -> bool {
        self.with_driver(|driver| driver.poll())
    }

    /// Release the driver
    pub fn into_inner(self) -> Driver<'a, L, C> {
        self.driver.into_inner().into_inner()
    }
}
