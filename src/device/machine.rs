use std::sync::Arc;
use log::{debug, info, trace, warn};
use tokio::sync::watch;

use crate::device::adapter::{GattCharacteristic, RadioAdapter};
use crate::device::codec::{encode_command, DecodeContext};
use crate::device::constants::{PERIPHERAL_NAME, READ_CHARACTERISTIC_UUID, SERVICE_UUID, WRITE_CHARACTERISTIC_UUID};
use crate::device::telemetry::TelemetryStore;
use crate::device::types::{AdapterPower, ConnectionState, RadioEvent, TuningParameter, TuningValues, UserCommand};

pub type AdapterEvent<A> = RadioEvent<<A as RadioAdapter>::Device, <A as RadioAdapter>::Characteristic>;

/**
 * Connection lifecycle of the vehicle.
 *
 * All mutation happens through `connect`, `disconnect`, `set_parameter` and
 * `handle_event`, which must be called from one task. Other tasks observe the
 * state through `status()` and the shared telemetry store.
 */
pub struct ConnectionMachine<A: RadioAdapter> {
    adapter: A,
    state: ConnectionState,
    status: watch::Sender<ConnectionState>,
    // last power state reported by the adapter
    power: AdapterPower,
    want_connection: bool,
    // a scan was requested and no device has been picked from it yet
    scanning: bool,
    user_disconnect: bool,
    device: Option<A::Device>,
    write_characteristic: Option<A::Characteristic>,
    read_characteristic: Option<A::Characteristic>,
    decode_context: DecodeContext,
    tuning: watch::Sender<TuningValues>,
    telemetry: Arc<TelemetryStore>,
}

impl<A: RadioAdapter> ConnectionMachine<A> {
    pub fn new(adapter: A, tuning: TuningValues, telemetry: Arc<TelemetryStore>) -> Self {
        let (status, _) = watch::channel(ConnectionState::Initial);
        let (tuning, _) = watch::channel(tuning);

        ConnectionMachine {
            adapter,
            state: ConnectionState::Initial,
            status,
            power: AdapterPower::Unknown,
            want_connection: false,
            scanning: false,
            user_disconnect: false,
            device: None,
            write_characteristic: None,
            read_characteristic: None,
            decode_context: DecodeContext::default(),
            tuning,
            telemetry,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> watch::Receiver<ConnectionState> {
        self.status.subscribe()
    }

    pub fn tuning(&self) -> TuningValues {
        *self.tuning.borrow()
    }

    pub fn tuning_updates(&self) -> watch::Receiver<TuningValues> {
        self.tuning.subscribe()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryStore> {
        &self.telemetry
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }

        if self.state == ConnectionState::Ready {
            self.write_characteristic = None;
            self.read_characteristic = None;
        }

        info!("Connection state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.status.send_replace(state);
    }

    pub fn connect(&mut self) {
        match self.state {
            ConnectionState::Searching | ConnectionState::Connecting | ConnectionState::Ready => {
                debug!("Ignoring connect request while {:?}", self.state);
            },
            _ => {
                self.want_connection = true;
                self.set_state(ConnectionState::Searching);
                self.adapter.initialize();
            },
        }
    }

    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Ready {
            debug!("Ignoring disconnect request while {:?}", self.state);
            return;
        }

        if let Some(device) = &self.device {
            info!("Disconnecting from {:?}", device);
            self.adapter.disconnect(device);
            self.user_disconnect = true;
        }
    }

    /// Stores the new value and sends it to the vehicle. Nothing is sent unless the connection is ready.
    pub fn set_parameter(&mut self, parameter: TuningParameter, value: f32) {
        self.tuning.send_modify(|tuning| tuning.set(parameter, value));

        if self.state != ConnectionState::Ready {
            debug!("Not sending {} = {} while {:?}", parameter, value, self.state);
            return;
        }

        let (Some(device), Some(characteristic)) = (&self.device, &self.write_characteristic) else {
            return;
        };

        debug!("Sending {} = {}", parameter, value);
        let (opcode, value) = encode_command(parameter.opcode(), value);
        self.adapter.write(device, characteristic, &opcode);
        self.adapter.write(device, characteristic, &value);
    }

    pub fn handle_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Connect => self.connect(),
            UserCommand::Disconnect => self.disconnect(),
            UserCommand::SetParameter(parameter, value) => self.set_parameter(parameter, value),
        }
    }

    pub fn handle_event(&mut self, event: AdapterEvent<A>) {
        match event {
            RadioEvent::PowerChanged(power) => self.on_power_changed(power),
            RadioEvent::DeviceDiscovered { device, local_name } => self.on_device_discovered(device, local_name),
            RadioEvent::Connected(device) => {
                if self.is_current_device(&device) {
                    debug!("Connected to {:?}; discovering services", device);
                    self.adapter.discover_services(&device);
                }
            },
            RadioEvent::ServicesDiscovered { device, services } => {
                if !self.is_current_device(&device) {
                    return;
                }

                for service in services.into_iter().filter(|uuid| *uuid == SERVICE_UUID) {
                    debug!("Discovering characteristics of service {}", service);
                    self.adapter.discover_characteristics(&device, service);
                }
            },
            RadioEvent::CharacteristicsDiscovered { device, service, characteristics } => {
                if self.is_current_device(&device) && service == SERVICE_UUID {
                    self.on_characteristics_discovered(&device, characteristics);
                }
            },
            RadioEvent::ValueUpdated { characteristic, value } => {
                if characteristic == READ_CHARACTERISTIC_UUID {
                    self.on_value_updated(&value);
                }
            },
            RadioEvent::Disconnected(device) => {
                if self.is_current_device(&device) {
                    self.on_disconnected();
                } else {
                    debug!("Ignoring disconnect of {:?}", device);
                }
            },
            RadioEvent::ConnectFailed(device) => {
                if self.is_current_device(&device) {
                    self.on_connect_failed();
                }
            },
            RadioEvent::DisconnectFailed(device) => {
                if self.is_current_device(&device) && self.user_disconnect {
                    warn!("Disconnect from {:?} failed; still connected", device);
                    self.user_disconnect = false;
                }
            },
        }
    }

    fn start_scan(&mut self) {
        info!("Scanning for {}...", PERIPHERAL_NAME);
        self.scanning = true;
        self.adapter.start_scan();
    }

    fn clear_link(&mut self) {
        self.device = None;
        self.write_characteristic = None;
        self.read_characteristic = None;
        self.decode_context.reset();
    }

    fn is_current_device(&self, device: &A::Device) -> bool {
        self.device.as_ref() == Some(device)
    }

    fn on_power_changed(&mut self, power: AdapterPower) {
        debug!("Adapter power state {:?}", power);
        self.power = power;

        match power.connection_state() {
            Some(state) => {
                // an interrupted scan resumes once the adapter is back
                if self.scanning {
                    self.scanning = false;
                    self.want_connection = true;
                }
                self.set_state(state);
            },
            None => {
                if self.want_connection {
                    self.want_connection = false;
                    self.set_state(ConnectionState::Searching);
                    self.start_scan();
                }
            },
        }
    }

    fn on_device_discovered(&mut self, device: A::Device, local_name: Option<String>) {
        if !self.scanning {
            return;
        }

        if local_name.as_deref() != Some(PERIPHERAL_NAME) {
            trace!("Skipping peripheral {:?} {:?}", device, local_name);
            return;
        }

        info!("Found {} ({:?}); connecting", PERIPHERAL_NAME, device);
        self.set_state(ConnectionState::Connecting);
        self.scanning = false;
        self.adapter.stop_scan();
        self.adapter.connect(&device);
        self.device = Some(device);
    }

    fn on_characteristics_discovered(&mut self, device: &A::Device, characteristics: Vec<A::Characteristic>) {
        for characteristic in characteristics {
            let uuid = characteristic.uuid();

            if uuid == WRITE_CHARACTERISTIC_UUID {
                debug!("Found write characteristic {}", uuid);
                self.write_characteristic = Some(characteristic);
            } else if uuid == READ_CHARACTERISTIC_UUID {
                debug!("Found read characteristic {}; subscribing", uuid);
                self.adapter.subscribe(device, &characteristic);
                self.read_characteristic = Some(characteristic);
            }
        }

        if self.write_characteristic.is_some() && self.read_characteristic.is_some() {
            self.set_state(ConnectionState::Ready);
        }
    }

    fn on_value_updated(&mut self, value: &[u8]) {
        match self.decode_context.feed(value) {
            Ok(Some(update)) => {
                trace!("{:?} = {}", update.channel, update.value);
                self.telemetry.apply(update);
            },
            Ok(None) => {},
            Err(err) => warn!("Dropping telemetry frame {:02x?}: {}", value, err),
        }
    }

    fn on_connect_failed(&mut self) {
        warn!("Could not connect to {}", PERIPHERAL_NAME);
        self.clear_link();
        self.user_disconnect = false;
        self.set_state(ConnectionState::LostConnection);
    }

    fn on_disconnected(&mut self) {
        self.clear_link();

        if self.user_disconnect {
            self.user_disconnect = false;
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        warn!("Connection lost");
        self.set_state(ConnectionState::LostConnection);

        match self.power.connection_state() {
            None => self.start_scan(),
            Some(state) => self.set_state(state),
        }
    }
}
