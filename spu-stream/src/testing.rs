//! Simulated hardware for tests.
//!
//! [`MockSpu`] keeps a register file, a chronological log of operations and
//! a copy of SPU RAM. Uploads stay pending until completed, at which point
//! the bytes land in RAM and the DMA interrupt line fires, like the real
//! device.
//!
//! Interrupts are delivered by [`MockIrqController`] the way a single core
//! takes them: a line raised while interrupts are masked, or while another
//! handler runs, waits until they are unmasked. [`MockSpu`] can raise a line
//! in the middle of foreground code to model preemption.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::config::ChannelMask;
use crate::constants::{SPU_RAM_SIZE, SPU_VOICE_COUNT};
use crate::irq::{CriticalSection, InterruptLine, InterruptSource};
use crate::spu::{Adsr, Spu};
use crate::stream::SpuDevice;

/// One register-level operation, in the order the core issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpuOp {
    IrqEnabled(bool),
    IrqAddress(u32),
    VoiceStart(u8, u32),
    VoiceLoop(u8, u32),
    Pitch(u8, u16),
    Adsr(u8, Adsr),
    KeyOn(u32),
    KeyOff(u32),
    Transfer { address: u32, length: usize },
}

struct SpuState {
    irq_enabled: bool,
    irq_address: u32,
    voice_start: [u32; SPU_VOICE_COUNT],
    voice_loop: [u32; SPU_VOICE_COUNT],
    pitch: [u16; SPU_VOICE_COUNT],
    adsr: [Option<Adsr>; SPU_VOICE_COUNT],
    playing: u32,
    log: Vec<SpuOp>,
    pending: Option<(u32, Vec<u8>)>,
    uploads: Vec<(u32, Vec<u8>)>,
    ram: Vec<u8>,
}

#[derive(Default)]
struct IrqState {
    full: bool,
    fast_depth: i32,
    in_handler: bool,
    pending: VecDeque<Arc<InterruptLine>>,
}

impl IrqState {
    fn masked(&self) -> bool {
        self.full || self.fast_depth > 0 || self.in_handler
    }
}

/// Single-core interrupt delivery shared by the mock SPU and critical
/// section.
#[derive(Default)]
pub struct MockIrqController {
    state: Mutex<IrqState>,
}

impl MockIrqController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, IrqState> {
        self.state.lock().unwrap()
    }

    /// Assert `line`. Runs its handler now unless interrupts are masked; a
    /// line already pending is not queued twice.
    pub fn raise(&self, line: &Arc<InterruptLine>) {
        {
            let mut state = self.state();
            if !state.pending.iter().any(|pending| Arc::ptr_eq(pending, line)) {
                state.pending.push_back(line.clone());
            }
        }
        self.deliver();
    }

    /// Lines raised but not yet serviced.
    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }

    fn deliver(&self) {
        loop {
            let line = {
                let mut state = self.state();
                if state.masked() {
                    return;
                }
                let Some(line) = state.pending.pop_front() else {
                    return;
                };
                state.in_handler = true;
                line
            };
            line.trigger();
            self.state().in_handler = false;
        }
    }
}

impl SpuState {
    fn land(&mut self, address: u32, data: Vec<u8>) {
        let start = address as usize;
        self.ram[start..start + data.len()].copy_from_slice(&data);
        self.uploads.push((address, data));
    }
}

/// Recording SPU whose DMA completion drives a real [`InterruptLine`].
pub struct MockSpu {
    state: Mutex<SpuState>,
    dma_irq: Arc<InterruptLine>,
    irq: Arc<MockIrqController>,
    instant_transfers: AtomicBool,
    preempt: Mutex<Option<(usize, Arc<InterruptLine>)>>,
}

impl MockSpu {
    pub fn new(dma_irq: Arc<InterruptLine>, irq: Arc<MockIrqController>) -> Self {
        MockSpu {
            state: Mutex::new(SpuState {
                irq_enabled: false,
                irq_address: 0,
                voice_start: [0; SPU_VOICE_COUNT],
                voice_loop: [0; SPU_VOICE_COUNT],
                pitch: [0; SPU_VOICE_COUNT],
                adsr: [None; SPU_VOICE_COUNT],
                playing: 0,
                log: Vec::new(),
                pending: None,
                uploads: Vec::new(),
                ram: vec![0; SPU_RAM_SIZE as usize],
            }),
            dma_irq,
            irq,
            instant_transfers: AtomicBool::new(false),
            preempt: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, SpuState> {
        self.state.lock().unwrap()
    }

    fn record(&self, op: SpuOp) -> MutexGuard<'_, SpuState> {
        self.preemption_point();
        let mut state = self.state();
        state.log.push(op);
        state
    }

    /// Raise `line` just before the operation after the next `skip` ones,
    /// as if it fired while the caller was issuing it.
    pub fn preempt_after(&self, skip: usize, line: &Arc<InterruptLine>) {
        *self.preempt.lock().unwrap() = Some((skip, line.clone()));
    }

    pub fn preempt_next_op(&self, line: &Arc<InterruptLine>) {
        self.preempt_after(0, line);
    }

    fn preemption_point(&self) {
        let line = {
            let mut preempt = self.preempt.lock().unwrap();
            match preempt.take() {
                Some((0, line)) => Some(line),
                Some((skip, line)) => {
                    *preempt = Some((skip - 1, line));
                    None
                }
                None => None,
            }
        };
        if let Some(line) = line {
            self.irq.raise(&line);
        }
    }

    /// Finish every upload the moment it starts, raising the DMA interrupt
    /// from inside [`Spu::start_transfer()`].
    pub fn set_instant_transfers(&self, instant: bool) {
        self.instant_transfers.store(instant, Ordering::Relaxed);
    }

    /// Finish the pending upload, if any, and fire the DMA interrupt.
    ///
    /// Returns `false` if nothing was in flight.
    pub fn complete_transfer(&self) -> bool {
        let finished = {
            let mut state = self.state();
            match state.pending.take() {
                Some((address, data)) => {
                    state.land(address, data);
                    true
                }
                None => false,
            }
        };
        if finished {
            self.irq.raise(&self.dma_irq);
        }
        finished
    }

    pub fn transfer_idle(&self) -> bool {
        self.state().pending.is_none()
    }

    pub fn irq_enabled(&self) -> bool {
        self.state().irq_enabled
    }

    pub fn irq_address(&self) -> u32 {
        self.state().irq_address
    }

    pub fn voice_start(&self, voice: u8) -> u32 {
        self.state().voice_start[voice as usize]
    }

    pub fn voice_loop(&self, voice: u8) -> u32 {
        self.state().voice_loop[voice as usize]
    }

    pub fn pitch(&self, voice: u8) -> u16 {
        self.state().pitch[voice as usize]
    }

    pub fn adsr(&self, voice: u8) -> Option<Adsr> {
        self.state().adsr[voice as usize]
    }

    /// Voices keyed on and not keyed off since.
    pub fn playing(&self) -> u32 {
        self.state().playing
    }

    /// Completed uploads, oldest first.
    pub fn uploads(&self) -> Vec<(u32, Vec<u8>)> {
        self.state().uploads.clone()
    }

    /// Address of the upload in flight.
    pub fn pending_address(&self) -> Option<u32> {
        self.state().pending.as_ref().map(|(address, _)| *address)
    }

    pub fn ram(&self, address: u32, length: usize) -> Vec<u8> {
        let start = address as usize;
        self.state().ram[start..start + length].to_vec()
    }

    pub fn log(&self) -> Vec<SpuOp> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }
}

impl Spu for MockSpu {
    fn set_irq_enabled(&self, enabled: bool) {
        self.record(SpuOp::IrqEnabled(enabled)).irq_enabled = enabled;
    }

    fn set_irq_address(&self, address: u32) {
        self.record(SpuOp::IrqAddress(address)).irq_address = address;
    }

    fn set_voice_start(&self, voice: u8, address: u32) {
        self.record(SpuOp::VoiceStart(voice, address)).voice_start[voice as usize] = address;
    }

    fn set_voice_loop(&self, voice: u8, address: u32) {
        self.record(SpuOp::VoiceLoop(voice, address)).voice_loop[voice as usize] = address;
    }

    fn set_voice_pitch(&self, voice: u8, pitch: u16) {
        self.record(SpuOp::Pitch(voice, pitch)).pitch[voice as usize] = pitch;
    }

    fn set_voice_adsr(&self, voice: u8, adsr: Adsr) {
        self.record(SpuOp::Adsr(voice, adsr)).adsr[voice as usize] = Some(adsr);
    }

    fn key_on(&self, voices: ChannelMask) {
        self.record(SpuOp::KeyOn(voices.bits())).playing |= voices.bits();
    }

    fn key_off(&self, voices: ChannelMask) {
        self.record(SpuOp::KeyOff(voices.bits())).playing &= !voices.bits();
    }

    fn start_transfer(&self, address: u32, data: &[u8]) {
        let instant = self.instant_transfers.load(Ordering::Relaxed);
        {
            let mut state = self.record(SpuOp::Transfer {
                address,
                length: data.len(),
            });
            assert!(state.pending.is_none(), "upload started while another is in flight");
            if instant {
                state.land(address, data.to_vec());
            } else {
                state.pending = Some((address, data.to_vec()));
            }
        }
        if instant {
            self.irq.raise(&self.dma_irq);
        }
    }

    fn is_transfer_complete(&self) -> bool {
        self.complete_transfer();
        true
    }
}

/// Critical section masking a [`MockIrqController`]. Unmasking delivers
/// whatever was raised in between.
pub struct MockCriticalSection {
    irq: Arc<MockIrqController>,
    full_exits: AtomicU32,
    fast_sections: AtomicU32,
}

impl MockCriticalSection {
    pub fn new() -> Self {
        Self::with_controller(MockIrqController::new())
    }

    pub fn with_controller(irq: Arc<MockIrqController>) -> Self {
        MockCriticalSection {
            irq,
            full_exits: AtomicU32::new(0),
            fast_sections: AtomicU32::new(0),
        }
    }

    /// Whether a full critical section is open.
    pub fn masked(&self) -> bool {
        self.irq.state().full
    }

    pub fn full_exits(&self) -> u32 {
        self.full_exits.load(Ordering::Relaxed)
    }

    pub fn fast_depth(&self) -> i32 {
        self.irq.state().fast_depth
    }

    pub fn fast_sections(&self) -> u32 {
        self.fast_sections.load(Ordering::Relaxed)
    }
}

impl CriticalSection for MockCriticalSection {
    fn enter(&self) -> bool {
        let mut state = self.irq.state();
        !std::mem::replace(&mut state.full, true)
    }

    fn exit(&self) {
        self.irq.state().full = false;
        self.full_exits.fetch_add(1, Ordering::Relaxed);
        self.irq.deliver();
    }

    fn fast_enter(&self) {
        self.irq.state().fast_depth += 1;
        self.fast_sections.fetch_add(1, Ordering::Relaxed);
    }

    fn fast_exit(&self) {
        self.irq.state().fast_depth -= 1;
        self.irq.deliver();
    }
}

pub type MockDevice = SpuDevice<MockSpu, MockCriticalSection, Arc<InterruptLine>>;

/// A device wired to mock hardware, plus handles to its interrupt lines.
pub struct Rig {
    pub device: MockDevice,
    pub irq: Arc<MockIrqController>,
    pub spu_irq: Arc<InterruptLine>,
    pub dma_irq: Arc<InterruptLine>,
}

impl Rig {
    /// Simulate the SPU reaching the watch address.
    pub fn fire_irq(&self) {
        self.irq.raise(&self.spu_irq);
    }

    /// Simulate the pending upload finishing.
    pub fn finish_upload(&self) -> bool {
        self.device.spu().complete_transfer()
    }

    pub fn spu(&self) -> &MockSpu {
        self.device.spu()
    }
}

pub fn rig() -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();

    let irq = MockIrqController::new();
    let spu_irq = Arc::new(InterruptLine::new("spu"));
    let dma_irq = Arc::new(InterruptLine::new("spu-dma"));
    let device = SpuDevice::new(
        MockSpu::new(dma_irq.clone(), irq.clone()),
        MockCriticalSection::with_controller(irq.clone()),
        spu_irq.clone(),
        dma_irq.clone(),
    );
    Rig {
        device,
        irq,
        spu_irq,
        dma_irq,
    }
}

/// Run `f` on its own thread and fail if it does not finish in time. A
/// handler spinning on a lock held by the code it preempted never returns.
pub fn run_with_deadline(f: impl FnOnce() + Send + 'static) {
    let (done, finished) = mpsc::channel();
    let worker = thread::spawn(move || {
        f();
        let _ = done.send(());
    });
    match finished.recv_timeout(Duration::from_secs(5)) {
        Ok(()) => worker.join().unwrap(),
        Err(RecvTimeoutError::Timeout) => panic!("deadlocked: handler never returned"),
        Err(RecvTimeoutError::Disconnected) => {
            if let Err(panic) = worker.join() {
                std::panic::resume_unwind(panic);
            }
        }
    }
}
