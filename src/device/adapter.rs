//! The radio primitives the connection state machine is driven through.
//!
//! Every request is fire-and-forget: an adapter queues the work and reports
//! the outcome later as a [`RadioEvent`](crate::device::types::RadioEvent).

use std::fmt::Debug;
use uuid::Uuid;

/// A characteristic handle as handed out by an adapter.
pub trait GattCharacteristic: Clone + Debug {
    fn uuid(&self) -> Uuid;
}

impl GattCharacteristic for Uuid {
    fn uuid(&self) -> Uuid {
        *self
    }
}

impl GattCharacteristic for btleplug::api::Characteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

pub trait RadioAdapter {
    type Device: Clone + Debug + PartialEq;
    type Characteristic: GattCharacteristic;

    /// Bring the adapter up (if needed) and report its power state with a `PowerChanged` event.
    fn initialize(&mut self);

    /// Scan without a service filter; every advertisement yields `DeviceDiscovered`.
    fn start_scan(&mut self);

    fn stop_scan(&mut self);

    /// Yields `Connected`, or `Disconnected` when the link could not be established.
    fn connect(&mut self, device: &Self::Device);

    /// Yields `Disconnected`.
    fn disconnect(&mut self, device: &Self::Device);

    /// Unfiltered, yields `ServicesDiscovered`.
    fn discover_services(&mut self, device: &Self::Device);

    /// Unfiltered, yields `CharacteristicsDiscovered`.
    fn discover_characteristics(&mut self, device: &Self::Device, service: Uuid);

    /// Enables notifications; every notification yields `ValueUpdated`.
    fn subscribe(&mut self, device: &Self::Device, characteristic: &Self::Characteristic);

    /// Write with acknowledgement. Writes are performed in the order they are requested.
    fn write(&mut self, device: &Self::Device, characteristic: &Self::Characteristic, data: &[u8]);
}
