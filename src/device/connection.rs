use std::sync::Arc;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use btleplug::api::{Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use log::{debug, info, trace, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use crate::device::adapter::RadioAdapter;
use crate::device::constants::{ADAPTER_STATE_DEADLINE, WRITE_DEADLINE};
use crate::device::machine::ConnectionMachine;
use crate::device::session::{spawn_session, ClientHandle};
use crate::device::telemetry::TelemetryStore;
use crate::device::types::{AdapterPower, RadioEvent, TuningValues};
use crate::error::DeviceError;

pub type BtleEvent = RadioEvent<PeripheralId, Characteristic>;

#[derive(Debug)]
enum AdapterRequest {
    Initialize,
    StartScan,
    StopScan,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    DiscoverServices(PeripheralId),
    DiscoverCharacteristics(PeripheralId, Uuid),
    Subscribe(PeripheralId, Characteristic),
    Write(PeripheralId, Characteristic, Vec<u8>),
}

/**
 * The state machine's view of btleplug. Requests are queued to the driver
 * task, which performs them one after another.
 */
pub struct BtleAdapter {
    requests: UnboundedSender<AdapterRequest>,
}

impl BtleAdapter {
    fn request(&mut self, request: AdapterRequest) {
        if let Err(err) = self.requests.unbounded_send(request) {
            warn!("Radio driver has stopped, dropping {:?}", err.into_inner());
        }
    }
}

impl RadioAdapter for BtleAdapter {
    type Device = PeripheralId;
    type Characteristic = Characteristic;

    fn initialize(&mut self) {
        self.request(AdapterRequest::Initialize);
    }

    fn start_scan(&mut self) {
        self.request(AdapterRequest::StartScan);
    }

    fn stop_scan(&mut self) {
        self.request(AdapterRequest::StopScan);
    }

    fn connect(&mut self, device: &PeripheralId) {
        self.request(AdapterRequest::Connect(device.clone()));
    }

    fn disconnect(&mut self, device: &PeripheralId) {
        self.request(AdapterRequest::Disconnect(device.clone()));
    }

    fn discover_services(&mut self, device: &PeripheralId) {
        self.request(AdapterRequest::DiscoverServices(device.clone()));
    }

    fn discover_characteristics(&mut self, device: &PeripheralId, service: Uuid) {
        self.request(AdapterRequest::DiscoverCharacteristics(device.clone(), service));
    }

    fn subscribe(&mut self, device: &PeripheralId, characteristic: &Characteristic) {
        self.request(AdapterRequest::Subscribe(device.clone(), characteristic.clone()));
    }

    fn write(&mut self, device: &PeripheralId, characteristic: &Characteristic, data: &[u8]) {
        self.request(AdapterRequest::Write(device.clone(), characteristic.clone(), data.to_vec()));
    }
}

pub fn power_from_central_state(state: CentralState) -> AdapterPower {
    match state {
        CentralState::PoweredOn => AdapterPower::PoweredOn,
        CentralState::PoweredOff => AdapterPower::PoweredOff,
        _ => AdapterPower::Unknown,
    }
}

fn power_from_error(err: &DeviceError) -> AdapterPower {
    match err {
        DeviceError::NoAdapter => AdapterPower::Unsupported,
        err if err.is_permission_denied() => AdapterPower::Unauthorized,
        _ => AdapterPower::Unknown,
    }
}

async fn open_adapter(manager: &Manager) -> Result<Adapter, DeviceError> {
    let adapters = manager.adapters().await?;
    let adapter = adapters.into_iter().next().ok_or(DeviceError::NoAdapter)?;
    info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
    Ok(adapter)
}

async fn translate_central_event(adapter: &Adapter, event: CentralEvent) -> Option<BtleEvent> {
    match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
            let peripheral = match adapter.peripheral(&id).await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to look up discovered peripheral {:?}: {}", id, err);
                    return None;
                },
            };

            let local_name = match peripheral.properties().await {
                Ok(Some(properties)) => properties.local_name,
                Ok(None) => None,
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                    None
                },
            };

            Some(RadioEvent::DeviceDiscovered { device: id, local_name })
        },
        CentralEvent::DeviceDisconnected(id) => Some(RadioEvent::Disconnected(id)),
        CentralEvent::StateUpdate(state) => Some(RadioEvent::PowerChanged(power_from_central_state(state))),
        _ => None,
    }
}

fn forward_central_events_task(cancel: CancellationToken, adapter: &Adapter, events: UnboundedSender<BtleEvent>) -> JoinHandle<Result<(), DeviceError>> {
    let adapter_clone = adapter.clone();

    spawn(async move {
        let mut central_events = adapter_clone.events().await?;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(event) = central_events.next() => {
                    if let Some(event) = translate_central_event(&adapter_clone, event).await {
                        if events.unbounded_send(event).is_err() {
                            break 'mainloop;
                        }
                    }
                },
                else => break 'mainloop,
            }
        }

        Ok(())
    })
}

fn read_notifications_task(cancel: CancellationToken, peripheral: &Peripheral, events: UnboundedSender<BtleEvent>) -> JoinHandle<Result<(), DeviceError>> {
    let peripheral_clone = peripheral.clone();

    spawn(async move {
        let mut notification_stream = peripheral_clone.notifications().await?;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(data) = notification_stream.next() => {
                    trace!("Notification {} {:02x?}", data.uuid, data.value);
                    let event = RadioEvent::ValueUpdated { characteristic: data.uuid, value: data.value };
                    if events.unbounded_send(event).is_err() {
                        break 'mainloop;
                    }
                },
                else => break 'mainloop,
            }
        }

        Ok(())
    })
}

/**
 * Performs adapter requests against btleplug and reports the outcomes as events.
 */
struct Driver {
    cancel: CancellationToken,
    events: UnboundedSender<BtleEvent>,
    // the manager is kept alive for as long as its adapter is used
    _manager: Option<Manager>,
    adapter: Option<Adapter>,
    notifications_cancel: CancellationToken,
}

impl Driver {
    fn emit(&self, event: BtleEvent) {
        if self.events.unbounded_send(event).is_err() {
            debug!("Session has stopped, dropping adapter event");
        }
    }

    fn adapter(&self) -> Result<&Adapter, DeviceError> {
        self.adapter.as_ref().ok_or(DeviceError::NoAdapter)
    }

    async fn peripheral(&self, id: &PeripheralId) -> Result<Peripheral, DeviceError> {
        Ok(self.adapter()?.peripheral(id).await?)
    }

    async fn ensure_adapter(&mut self) -> Result<Adapter, DeviceError> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let manager = Manager::new().await?;
        let adapter = open_adapter(&manager).await?;
        forward_central_events_task(self.cancel.clone(), &adapter, self.events.clone());

        self._manager = Some(manager);
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    async fn initialize(&mut self) {
        let adapter = match self.ensure_adapter().await {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!("Failed to open bluetooth adapter: {}", err);
                self.emit(RadioEvent::PowerChanged(power_from_error(&err)));
                return;
            },
        };

        let power = match timeout(Duration::from_millis(ADAPTER_STATE_DEADLINE), adapter.adapter_state()).await {
            Ok(Ok(state)) => power_from_central_state(state),
            Ok(Err(err)) => {
                // not every platform reports its state, scanning will fail loudly if it is actually off
                warn!("Failed to query adapter state, assuming it is powered on: {:?}", err);
                AdapterPower::PoweredOn
            },
            Err(_) => {
                warn!("Querying adapter state took too long, assuming it is powered on");
                AdapterPower::PoweredOn
            },
        };

        self.emit(RadioEvent::PowerChanged(power));
    }

    async fn connect(&mut self, id: PeripheralId) {
        let result = match self.peripheral(&id).await {
            Ok(peripheral) => {
                info!("Connecting to peripheral...");
                peripheral.connect().await.map_err(DeviceError::from)
            },
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => self.emit(RadioEvent::Connected(id)),
            Err(err) => {
                warn!("Connecting to peripheral failed: {:?}", err);
                self.emit(RadioEvent::ConnectFailed(id));
            },
        }
    }

    async fn subscribe(&mut self, id: &PeripheralId, characteristic: &Characteristic) -> Result<(), DeviceError> {
        let peripheral = self.peripheral(id).await?;

        info!("Subscribing to characteristic {:?}", characteristic.uuid);
        peripheral.subscribe(characteristic).await?;

        // a fresh stream per connection; the previous one belongs to a dropped link
        self.notifications_cancel.cancel();
        self.notifications_cancel = self.cancel.child_token();
        read_notifications_task(self.notifications_cancel.clone(), &peripheral, self.events.clone());
        Ok(())
    }

    async fn disconnect(&mut self, id: PeripheralId) {
        let result = match self.peripheral(&id).await {
            Ok(peripheral) => peripheral.disconnect().await.map_err(DeviceError::from),
            Err(err) => Err(err),
        };

        match result {
            // notifications stop only once the link is really gone
            Ok(()) => self.notifications_cancel.cancel(),
            Err(err) => {
                warn!("Disconnecting from peripheral failed: {:?}", err);
                self.emit(RadioEvent::DisconnectFailed(id));
            },
        }
    }

    async fn write(&self, id: &PeripheralId, characteristic: &Characteristic, data: &[u8]) -> Result<(), DeviceError> {
        let peripheral = self.peripheral(id).await?;
        let fut = peripheral.write(characteristic, data, WriteType::WithResponse);

        tokio::select! {
            _ = sleep(Duration::from_millis(WRITE_DEADLINE)) => {
                warn!("Sending to write characteristic took too long");
                Ok(())
            }
            result = fut => Ok(result?),
        }
    }

    async fn perform(&mut self, request: AdapterRequest) -> Result<(), DeviceError> {
        debug!("Performing {:?}", request);

        match request {
            AdapterRequest::Initialize => self.initialize().await,
            AdapterRequest::StartScan => self.adapter()?.start_scan(ScanFilter::default()).await?,
            AdapterRequest::StopScan => self.adapter()?.stop_scan().await?,
            AdapterRequest::Connect(id) => self.connect(id).await,
            AdapterRequest::Disconnect(id) => self.disconnect(id).await,
            AdapterRequest::DiscoverServices(id) => {
                let peripheral = self.peripheral(&id).await?;
                peripheral.discover_services().await?;
                let services = peripheral.services().iter().map(|service| service.uuid).collect();
                self.emit(RadioEvent::ServicesDiscovered { device: id, services });
            },
            AdapterRequest::DiscoverCharacteristics(id, service_uuid) => {
                let peripheral = self.peripheral(&id).await?;
                let service = peripheral.services()
                    .into_iter()
                    .find(|service| service.uuid == service_uuid)
                    .ok_or(DeviceError::MissingService(service_uuid))?;
                let characteristics = service.characteristics.into_iter().collect();
                self.emit(RadioEvent::CharacteristicsDiscovered { device: id, service: service_uuid, characteristics });
            },
            AdapterRequest::Subscribe(id, characteristic) => self.subscribe(&id, &characteristic).await?,
            AdapterRequest::Write(id, characteristic, data) => self.write(&id, &characteristic, &data).await?,
        }

        Ok(())
    }

    async fn run(mut self, mut requests: UnboundedReceiver<AdapterRequest>) {
        'mainloop: loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(request) = requests.next() => {
                    if let Err(err) = self.perform(request).await {
                        warn!("Radio request failed: {}", err);
                    }
                },
                else => break 'mainloop,
            }
        }

        self.notifications_cancel.cancel();
        info!("Radio driver stopped");
    }
}

/**
 * Starts a client for the vehicle on top of the first bluetooth adapter.
 * The returned join handle completes once `cancel` has fired.
 */
pub fn start_client(cancel: CancellationToken, tuning: TuningValues, telemetry_default: f32) -> (ClientHandle, JoinHandle<()>) {
    let (request_sender, request_receiver) = unbounded::<AdapterRequest>();
    let (event_sender, event_receiver) = unbounded::<BtleEvent>();

    let driver = Driver {
        cancel: cancel.clone(),
        events: event_sender,
        _manager: None,
        adapter: None,
        notifications_cancel: cancel.child_token(),
    };
    let driver_handle = spawn(driver.run(request_receiver));

    let adapter = BtleAdapter { requests: request_sender };
    let machine = ConnectionMachine::new(adapter, tuning, Arc::new(TelemetryStore::new(telemetry_default)));
    let (client, session_handle) = spawn_session(cancel, machine, event_receiver);

    let join_handle = spawn(async move {
        if let Err(err) = session_handle.await {
            warn!("Session task failed: {:?}", err);
        }
        if let Err(err) = driver_handle.await {
            warn!("Radio driver task failed: {:?}", err);
        }
    });

    (client, join_handle)
}
