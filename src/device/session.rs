use std::sync::Arc;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::{Stream, StreamExt};
use log::{info, warn};
use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::adapter::RadioAdapter;
use crate::device::machine::{AdapterEvent, ConnectionMachine};
use crate::device::telemetry::TelemetryStore;
use crate::device::types::{ConnectionState, TuningParameter, TuningValues, UserCommand};

/**
 * Cloneable access to a running session: user commands go in, the connection
 * state and telemetry can be read at any time from any thread.
 */
#[derive(Clone)]
pub struct ClientHandle {
    commands: UnboundedSender<UserCommand>,
    status: watch::Receiver<ConnectionState>,
    tuning: watch::Receiver<TuningValues>,
    telemetry: Arc<TelemetryStore>,
}

impl ClientHandle {
    fn send(&self, command: UserCommand) {
        if let Err(err) = self.commands.unbounded_send(command) {
            warn!("Session has stopped, dropping {:?}", err.into_inner());
        }
    }

    pub fn connect(&self) {
        self.send(UserCommand::Connect);
    }

    pub fn disconnect(&self) {
        self.send(UserCommand::Disconnect);
    }

    pub fn set_parameter(&self, parameter: TuningParameter, value: f32) {
        self.send(UserCommand::SetParameter(parameter, value));
    }

    pub fn state(&self) -> ConnectionState {
        *self.status.borrow()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    /// Tuning values as last applied by the session.
    pub fn tuning(&self) -> TuningValues {
        *self.tuning.borrow()
    }

    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }
}

/**
 * Spawns the task that owns the state machine. Adapter events and user
 * commands are applied one at a time, in arrival order, until `cancel` fires
 * or both inputs are closed.
 */
pub fn spawn_session<A, E>(cancel: CancellationToken, mut machine: ConnectionMachine<A>, mut events: E) -> (ClientHandle, JoinHandle<()>)
where
    A: RadioAdapter + Send + 'static,
    A::Device: Send,
    A::Characteristic: Send,
    E: Stream<Item = AdapterEvent<A>> + Unpin + Send + 'static,
{
    let (command_sender, mut command_receiver) = unbounded::<UserCommand>();

    let handle = ClientHandle {
        commands: command_sender,
        status: machine.status(),
        tuning: machine.tuning_updates(),
        telemetry: Arc::clone(machine.telemetry()),
    };

    let join_handle = spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(event) = events.next() => {
                    machine.handle_event(event);
                },
                Some(command) = command_receiver.next() => {
                    machine.handle_command(command);
                },
                else => break 'mainloop,
            }
        }

        info!("Session stopped in state {:?}", machine.state());
    });

    (handle, join_handle)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use futures::channel::mpsc::{unbounded, UnboundedReceiver};
    use tokio::time::timeout;
    use super::*;
    use crate::device::constants::{READ_CHARACTERISTIC_UUID, SERVICE_UUID, WRITE_CHARACTERISTIC_UUID};
    use crate::device::testing::{FakeAdapter, Request, SEGWAY};
    use crate::device::types::{AdapterPower, RadioEvent, TuningValues};

    type Event = AdapterEvent<FakeAdapter>;

    fn start(cancel: CancellationToken) -> (ClientHandle, JoinHandle<()>, UnboundedSender<Event>, UnboundedReceiver<Request>) {
        let (adapter, requests) = FakeAdapter::with_channel();
        let machine = ConnectionMachine::new(adapter, TuningValues::default(), Arc::new(TelemetryStore::new(0.0)));
        let (events_tx, events_rx) = unbounded::<Event>();
        let (handle, join_handle) = spawn_session(cancel, machine, events_rx);
        (handle, join_handle, events_tx, requests)
    }

    async fn next_request(requests: &mut UnboundedReceiver<Request>) -> Request {
        timeout(Duration::from_secs(5), requests.next())
            .await
            .expect("timed out waiting for request")
            .expect("request channel closed")
    }

    async fn wait_for_state(handle: &ClientHandle, state: ConnectionState) {
        let mut status = handle.status();
        timeout(Duration::from_secs(5), status.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("status channel closed");
    }

    #[tokio::test]
    async fn drives_machine_to_ready_and_sends_commands() {
        let cancel = CancellationToken::new();
        let (handle, join_handle, events, mut requests) = start(cancel.clone());
        assert_eq!(handle.state(), ConnectionState::Initial);

        handle.connect();
        assert_eq!(next_request(&mut requests).await, Request::Initialize);
        assert_eq!(handle.state(), ConnectionState::Searching);

        events.unbounded_send(RadioEvent::PowerChanged(AdapterPower::PoweredOn)).unwrap();
        assert_eq!(next_request(&mut requests).await, Request::StartScan);

        events.unbounded_send(RadioEvent::DeviceDiscovered { device: SEGWAY, local_name: Some("Segway".to_string()) }).unwrap();
        events.unbounded_send(RadioEvent::Connected(SEGWAY)).unwrap();
        events.unbounded_send(RadioEvent::ServicesDiscovered { device: SEGWAY, services: vec![SERVICE_UUID] }).unwrap();
        events.unbounded_send(RadioEvent::CharacteristicsDiscovered {
            device: SEGWAY,
            service: SERVICE_UUID,
            characteristics: vec![WRITE_CHARACTERISTIC_UUID, READ_CHARACTERISTIC_UUID],
        }).unwrap();
        wait_for_state(&handle, ConnectionState::Ready).await;

        events.unbounded_send(RadioEvent::ValueUpdated { characteristic: READ_CHARACTERISTIC_UUID, value: vec![0x04] }).unwrap();
        events.unbounded_send(RadioEvent::ValueUpdated { characteristic: READ_CHARACTERISTIC_UUID, value: 42.0_f32.to_le_bytes().to_vec() }).unwrap();
        timeout(Duration::from_secs(5), async {
            while handle.telemetry().pwm() != 42.0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }).await.expect("telemetry was not applied");

        handle.set_parameter(TuningParameter::ProportionalGain, 0.5);
        let mut writes = Vec::new();
        while writes.len() < 2 {
            if let Request::Write(_, characteristic, data) = next_request(&mut requests).await {
                assert_eq!(characteristic, WRITE_CHARACTERISTIC_UUID);
                writes.push(data);
            }
        }
        assert_eq!(writes, vec![vec![0x00], 0.5_f32.to_le_bytes().to_vec()]);
        assert_eq!(handle.tuning().proportional_gain, 0.5);
        assert_eq!(handle.telemetry().angle(), 0.0);

        cancel.cancel();
        join_handle.await.unwrap();
    }

    #[tokio::test]
    async fn reflects_adapter_power() {
        let cancel = CancellationToken::new();
        let (handle, join_handle, events, mut requests) = start(cancel.clone());

        handle.connect();
        assert_eq!(next_request(&mut requests).await, Request::Initialize);
        events.unbounded_send(RadioEvent::PowerChanged(AdapterPower::Unauthorized)).unwrap();
        wait_for_state(&handle, ConnectionState::Unauthorized).await;

        cancel.cancel();
        join_handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_inputs_close() {
        let (handle, join_handle, events, _requests) = start(CancellationToken::new());
        drop(events);
        drop(handle);
        timeout(Duration::from_secs(5), join_handle).await.unwrap().unwrap();
    }
}
