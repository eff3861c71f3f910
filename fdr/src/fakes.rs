//! In-memory stand-ins for the capability traits

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use hal::{
    BaroDevice, Clock, DeviceBus, DriverKind, ExportSink, IndicatorState, OpenMode, PersistentStore,
    SamplingProfile, StatusIndicator, StoreFile,
};

use crate::recorder::SampleSource;

/// Bus transaction other than a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCall {
    Open(u8, DriverKind),
    ReadRegister(u8, u8),
}

/// (temperature C, pressure Pa) returned by the next device read
pub type Reading = (Option<f32>, Option<f32>);

pub struct FakeBus {
    /// Addresses that acknowledge a probe
    pub present: Vec<u8>,
    /// Value of every identity register read
    pub chip_id: Option<u8>,
    /// (address, driver) pairs that open successfully
    pub openable: Vec<(u8, DriverKind)>,
    /// Opens that fail regardless of `openable`
    pub failing_opens: usize,
    pub calls: Vec<BusCall>,
    pub probes: Vec<u8>,
    readings: Rc<RefCell<VecDeque<Reading>>>,
    profiles: Rc<RefCell<Vec<SamplingProfile>>>,
}

impl FakeBus {
    /// Nothing on the bus
    pub fn empty() -> Self {
        Self {
            present: Vec::new(),
            chip_id: None,
            openable: Vec::new(),
            failing_opens: 0,
            calls: Vec::new(),
            probes: Vec::new(),
            readings: Rc::new(RefCell::new(VecDeque::new())),
            profiles: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A single part at `address` that answers to `kind`
    pub fn with_device(address: u8, kind: DriverKind) -> Self {
        let mut bus = Self::empty();
        bus.present.push(address);
        bus.openable.push((address, kind));
        bus
    }

    pub fn push_reading(&self, temperature: f32, pressure_pa: f32) {
        self.readings
            .borrow_mut()
            .push_back((Some(temperature), Some(pressure_pa)));
    }

    pub fn push_raw(&self, reading: Reading) {
        self.readings.borrow_mut().push_back(reading);
    }

    /// Profiles applied to any device opened on this bus, in order
    pub fn profiles(&self) -> Vec<SamplingProfile> {
        self.profiles.borrow().clone()
    }
}

impl DeviceBus for FakeBus {
    type Device = FakeDevice;

    fn probe(&mut self, addr: u8) -> bool {
        self.probes.push(addr);
        self.present.contains(&addr)
    }

    fn read_register(&mut self, addr: u8, reg: u8) -> Option<u8> {
        self.calls.push(BusCall::ReadRegister(addr, reg));
        if self.present.contains(&addr) {
            self.chip_id
        } else {
            None
        }
    }

    fn open(&mut self, addr: u8, kind: DriverKind) -> Option<FakeDevice> {
        self.calls.push(BusCall::Open(addr, kind));
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return None;
        }
        if !self.openable.contains(&(addr, kind)) {
            return None;
        }
        Some(FakeDevice {
            kind,
            address: addr,
            pending: None,
            readings: Rc::clone(&self.readings),
            profiles: Rc::clone(&self.profiles),
        })
    }
}

pub struct FakeDevice {
    kind: DriverKind,
    address: u8,
    pending: Option<Reading>,
    readings: Rc<RefCell<VecDeque<Reading>>>,
    profiles: Rc<RefCell<Vec<SamplingProfile>>>,
}

impl FakeDevice {
    fn current(&mut self) -> Reading {
        *self.pending.get_or_insert_with(|| {
            self.readings
                .borrow_mut()
                .pop_front()
                .unwrap_or((Some(21.0), Some(101_325.0)))
        })
    }
}

impl BaroDevice for FakeDevice {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn read_temperature(&mut self) -> Option<f32> {
        self.current().0
    }

    // temperature is always read first, so the pressure read consumes the reading
    fn read_pressure(&mut self) -> Option<f32> {
        let reading = self.current();
        self.pending = None;
        reading.1
    }

    fn configure(&mut self, profile: SamplingProfile) -> bool {
        self.profiles.borrow_mut().push(profile);
        true
    }
}

#[derive(Default)]
pub struct StoreState {
    pub files: HashMap<String, Vec<u8>>,
    pub mounted: bool,
    pub mount_fails: bool,
    pub format_fails: bool,
    pub mount_calls: Vec<bool>,
    /// Largest number of bytes a single write accepts
    pub write_limit: Option<usize>,
    pub fail_opens: bool,
}

/// Flash store backed by a shared map of path to contents
#[derive(Clone, Default)]
pub struct FakeStore(pub Rc<RefCell<StoreState>>);

impl FakeStore {
    pub fn contents(&self, path: &str) -> Option<String> {
        self.0
            .borrow()
            .files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.0.borrow_mut().write_limit = limit;
    }
}

impl PersistentStore for FakeStore {
    type File = FakeFile;

    fn mount(&mut self, format_on_failure: bool) -> bool {
        let mut state = self.0.borrow_mut();
        state.mount_calls.push(format_on_failure);
        if state.mounted {
            return true;
        }
        if !state.mount_fails {
            state.mounted = true;
        } else if format_on_failure && !state.format_fails {
            state.files.clear();
            state.mounted = true;
        }
        state.mounted
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Option<FakeFile> {
        let mut state = self.0.borrow_mut();
        if state.fail_opens || !state.mounted {
            return None;
        }
        match mode {
            OpenMode::Write => {
                state.files.insert(path.to_string(), Vec::new());
            }
            OpenMode::Append => {
                state.files.entry(path.to_string()).or_default();
            }
            OpenMode::Read => {
                if !state.files.contains_key(path) {
                    return None;
                }
            }
        }
        Some(FakeFile {
            state: Rc::clone(&self.0),
            path: path.to_string(),
            mode,
            position: 0,
        })
    }

    fn exists(&mut self, path: &str) -> bool {
        self.0.borrow().files.contains_key(path)
    }

    fn remove(&mut self, path: &str) -> bool {
        self.0.borrow_mut().files.remove(path).is_some()
    }
}

pub struct FakeFile {
    state: Rc<RefCell<StoreState>>,
    path: String,
    mode: OpenMode,
    position: usize,
}

impl StoreFile for FakeFile {
    fn write(&mut self, data: &[u8]) -> usize {
        if self.mode == OpenMode::Read {
            return 0;
        }
        let mut state = self.state.borrow_mut();
        let count = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        match state.files.get_mut(&self.path) {
            Some(contents) => {
                contents.extend_from_slice(&data[..count]);
                count
            }
            None => 0,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let state = self.state.borrow();
        let Some(contents) = state.files.get(&self.path) else {
            return 0;
        };
        let remaining = &contents[self.position.min(contents.len())..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        count
    }

    fn flush(&mut self) {}
}

#[derive(Clone, Default)]
pub struct FakeIndicator(pub Rc<RefCell<Vec<IndicatorState>>>);

impl FakeIndicator {
    pub fn states(&self) -> Vec<IndicatorState> {
        self.0.borrow().clone()
    }
}

impl StatusIndicator for FakeIndicator {
    fn set_state(&mut self, state: IndicatorState) {
        self.0.borrow_mut().push(state);
    }
}

#[derive(Clone, Default)]
pub struct ManualClock(pub Rc<Cell<u64>>);

impl ManualClock {
    pub fn set(&self, now_ms: u64) {
        self.0.set(now_ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

pub struct FakeSource {
    pub ready: bool,
    pub pressure: Option<f32>,
    pub fast_mode: Vec<bool>,
}

impl FakeSource {
    pub fn ready(pressure: f32) -> Self {
        Self {
            ready: true,
            pressure: Some(pressure),
            fast_mode: Vec::new(),
        }
    }
}

impl SampleSource for FakeSource {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn latest_smoothed_pressure(&self) -> Option<f32> {
        self.pressure
    }

    fn set_fast_mode(&mut self, enabled: bool) {
        self.fast_mode.push(enabled);
    }
}

#[derive(Default)]
pub struct VecSink {
    pub data: Vec<u8>,
    pub closed: bool,
}

impl VecSink {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl ExportSink for VecSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> bool {
        if self.closed {
            return false;
        }
        self.data.extend_from_slice(chunk);
        true
    }
}
