//! A radio adapter that records requests instead of talking to hardware.

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::device::adapter::RadioAdapter;

pub const SEGWAY: &str = "segway-peripheral";

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Initialize,
    StartScan,
    StopScan,
    Connect(&'static str),
    Disconnect(&'static str),
    DiscoverServices(&'static str),
    DiscoverCharacteristics(&'static str, Uuid),
    Subscribe(&'static str, Uuid),
    Write(&'static str, Uuid, Vec<u8>),
}

#[derive(Debug, Default)]
pub struct FakeAdapter {
    pub requests: Vec<Request>,
    sink: Option<UnboundedSender<Request>>,
}

impl FakeAdapter {
    /// An adapter that also forwards every request, for when the state machine lives in another task.
    pub fn with_channel() -> (FakeAdapter, UnboundedReceiver<Request>) {
        let (tx, rx) = unbounded();
        (FakeAdapter { requests: Vec::new(), sink: Some(tx) }, rx)
    }

    fn record(&mut self, request: Request) {
        if let Some(sink) = &self.sink {
            let _ = sink.unbounded_send(request.clone());
        }
        self.requests.push(request);
    }
}

impl RadioAdapter for FakeAdapter {
    type Device = &'static str;
    type Characteristic = Uuid;

    fn initialize(&mut self) {
        self.record(Request::Initialize);
    }

    fn start_scan(&mut self) {
        self.record(Request::StartScan);
    }

    fn stop_scan(&mut self) {
        self.record(Request::StopScan);
    }

    fn connect(&mut self, device: &&'static str) {
        self.record(Request::Connect(*device));
    }

    fn disconnect(&mut self, device: &&'static str) {
        self.record(Request::Disconnect(*device));
    }

    fn discover_services(&mut self, device: &&'static str) {
        self.record(Request::DiscoverServices(*device));
    }

    fn discover_characteristics(&mut self, device: &&'static str, service: Uuid) {
        self.record(Request::DiscoverCharacteristics(*device, service));
    }

    fn subscribe(&mut self, device: &&'static str, characteristic: &Uuid) {
        self.record(Request::Subscribe(*device, *characteristic));
    }

    fn write(&mut self, device: &&'static str, characteristic: &Uuid, data: &[u8]) {
        self.record(Request::Write(*device, *characteristic, data.to_vec()));
    }
}
