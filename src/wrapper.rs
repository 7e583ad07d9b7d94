// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

/*! The compiled unit lifecycle: compile, swap, process.

[DspLifecycle] is the control thread handle. It owns the compiler backend,
drives [DspLifecycle::setup] for recompilations and hands out the real time
side with [DspLifecycle::processor].

[DspProcessor] is the audio thread handle. Its [DspProcessor::process] never
blocks: it try-locks the shared state and skips the block when a swap is in
flight. The control thread in turn holds the lock only for the brief
installation of an already compiled unit, never for the compilation itself,
and tears the retired unit down only after releasing the lock. A skipped
block of audio during a user triggered recompilation is the whole price for
never stalling the audio thread behind a slow compile.
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{CompiledUnit, DspBackend, DspFactory};
use crate::buffer::{with_channel_table, ChannelBuffer};
use crate::error::DspError;
use crate::ui::{ControlDescriptor, ControlSet, UiRecorder, ZoneWriter};

/// Host processing configuration, supplied before the audio callback runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareSpecs {
    pub sample_rate: f64,
    pub block_size: usize,
    pub num_channels: usize,
}

/// What one `process` call did with its block.
///
/// Everything except [ProcessOutcome::Processed] leaves the host buffers
/// untouched. None of the skip cases are errors on the audio thread; lock
/// contention in particular is the expected companion of a recompilation
/// and is never logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The active unit computed the block.
    Processed,
    /// An installation holds the state lock; the block is skipped.
    SkippedLocked,
    /// No unit is installed (nothing compiled yet, or never successfully).
    SkippedNoUnit,
    /// The unit's channel arity does not match the host buffers or the
    /// adapter configuration. A silent configuration error.
    ChannelMismatch,
}

/// The (instance, factory) pair produced by one successful compilation.
///
/// Always retired as a whole. Field declaration order is load bearing here:
/// the instance must be dropped before the factory that created it, per the
/// backend's reference counting contract.
pub struct CompilationArtifact {
    unit: Box<dyn CompiledUnit>,
    _factory: Box<dyn DspFactory>,
}

impl CompilationArtifact {
    fn new(unit: Box<dyn CompiledUnit>, factory: Box<dyn DspFactory>) -> Self {
        Self { unit, _factory: factory }
    }

    fn unit_mut(&mut self) -> &mut dyn CompiledUnit {
        &mut *self.unit
    }
}

/// Everything the two threads share. The artifact, its control set and the
/// scratch buffer are replaced together as one logical unit, always under
/// the state lock.
#[derive(Default)]
struct EngineState {
    artifact: Option<CompilationArtifact>,
    controls: ControlSet,
    buffer: ChannelBuffer,
    sample_rate: f64,
}

struct Shared {
    state: Mutex<EngineState>,
    active_generation: Arc<AtomicU64>,
}

impl Shared {
    fn prepare(&self, specs: PrepareSpecs) {
        let mut state = self.state.lock();

        if state.sample_rate != specs.sample_rate {
            state.sample_rate = specs.sample_rate;
            if let Some(artifact) = state.artifact.as_mut() {
                artifact.unit_mut().init(specs.sample_rate);
            }
        }

        // no-op when the configuration did not change
        state.buffer.resize(specs.num_channels, specs.block_size);
    }

    fn reset(&self) {
        // try-lock: a contended reset loses against an installation, which
        // initializes the fresh unit anyway
        if let Some(mut state) = self.state.try_lock() {
            if let Some(artifact) = state.artifact.as_mut() {
                artifact.unit_mut().instance_clear();
            }
        }
    }

    fn process(&self, frames: usize, buffers: &mut [&mut [f32]]) -> ProcessOutcome {
        let mut guard = match self.state.try_lock() {
            Some(guard) => guard,
            None => return ProcessOutcome::SkippedLocked,
        };
        let state = &mut *guard;

        let artifact = match state.artifact.as_mut() {
            Some(artifact) => artifact,
            None => return ProcessOutcome::SkippedNoUnit,
        };
        let unit = artifact.unit_mut();

        let channels = buffers.len();
        if unit.num_inputs() != channels
            || unit.num_outputs() != channels
            || state.buffer.num_channels() != channels
        {
            return ProcessOutcome::ChannelMismatch;
        }

        // the unit may not tolerate in-place aliasing, so it computes from
        // the scratch copy back into the host buffers
        state.buffer.copy_in(buffers, frames);
        with_channel_table(&state.buffer, frames, |inputs| {
            unit.compute(frames, inputs, buffers);
        });

        ProcessOutcome::Processed
    }
}

/// Control thread handle; the sole owner of the compile/instantiate/install
/// sequence and of the compiler backend.
pub struct DspLifecycle {
    name: String,
    backend: Box<dyn DspBackend>,
    compile_args: Vec<String>,
    next_generation: u64,
    shared: Arc<Shared>,
}

impl DspLifecycle {
    /// `name` identifies compiled programs in backend diagnostics.
    pub fn new(name: &str, backend: Box<dyn DspBackend>) -> Self {
        Self {
            name: name.to_string(),
            backend,
            compile_args: vec![],
            next_generation: 0,
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState::default()),
                active_generation: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Backend specific compile flags, e.g. import search paths.
    pub fn set_compile_args(&mut self, args: Vec<String>) {
        self.compile_args = args;
    }

    /// Splits off the real time handle. Can be called more than once; all
    /// handles observe the same installed unit.
    pub fn processor(&self) -> DspProcessor {
        DspProcessor { shared: self.shared.clone() }
    }

    /// Compiles `source` and, on success, atomically replaces the active
    /// unit with the new one.
    ///
    /// Compilation, instantiation and control introspection all run without
    /// the state lock; the new unit is private until installed, and the
    /// audio thread keeps processing the previous one meanwhile. Only the
    /// installation itself (init with the last seen sample rate, artifact
    /// and control set swap, generation bump) holds the lock. The retired
    /// artifact is dropped after the lock is released.
    ///
    /// On any failure the previously installed unit stays active and
    /// untouched (last-good-wins).
    pub fn setup(&mut self, source: &str) -> Result<ControlSet, DspError> {
        let factory = self.backend.compile(&self.name, source, &self.compile_args)?;
        let mut unit = factory.create_instance().ok_or(DspError::Instantiate)?;

        self.next_generation += 1;
        let generation = self.next_generation;

        let mut recorder = UiRecorder::new(generation);
        unit.build_user_interface(&mut recorder);
        let controls = recorder.into_set();

        let retired = {
            let mut state = self.shared.state.lock();
            if state.sample_rate > 0.0 {
                unit.init(state.sample_rate);
            }
            let retired = state.artifact.replace(CompilationArtifact::new(unit, factory));
            state.controls = controls.clone();
            self.shared.active_generation.store(generation, Ordering::Release);
            retired
        };
        drop(retired);

        tracing::debug!(
            name = %self.name,
            generation,
            num_controls = controls.controls().len(),
            "installed new DSP unit"
        );

        Ok(controls)
    }

    /// The control set of the currently installed generation.
    pub fn controls(&self) -> ControlSet {
        self.shared.state.lock().controls.clone()
    }

    /// Builds the write-through handle for one control. The writer goes
    /// stale (and silently drops writes) once a newer generation is active.
    pub fn zone_writer(&self, control: &ControlDescriptor) -> ZoneWriter {
        ZoneWriter::new(
            control.zone.clone(),
            control.generation,
            self.shared.active_generation.clone(),
        )
    }

    /// The generation of the unit the audio thread currently sees.
    pub fn active_generation(&self) -> u64 {
        self.shared.active_generation.load(Ordering::Acquire)
    }

    /// True once some generation was installed successfully.
    pub fn has_unit(&self) -> bool {
        self.shared.state.lock().artifact.is_some()
    }

    // The control handle forwards the real time entry points too, for
    // single threaded hosts and tests.

    pub fn prepare(&self, specs: PrepareSpecs) {
        self.shared.prepare(specs);
    }

    pub fn reset(&self) {
        self.shared.reset();
    }

    pub fn process(&self, frames: usize, buffers: &mut [&mut [f32]]) -> ProcessOutcome {
        self.shared.process(frames, buffers)
    }
}

/// Audio thread handle. Cheap to clone, [Send] to the callback thread.
#[derive(Clone)]
pub struct DspProcessor {
    shared: Arc<Shared>,
}

impl DspProcessor {
    /// Reconfigures for new host specs. Re-`init`s the active unit on a
    /// sample rate change, resizes the scratch buffer on a channel count or
    /// block size change. Takes the blocking lock; hosts call this only on
    /// configuration changes, never per block.
    pub fn prepare(&self, specs: PrepareSpecs) {
        self.shared.prepare(specs);
    }

    /// Clears the active unit's internal state. No-op when no unit is
    /// installed or an installation is in flight.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// The real time entry point. Never blocks; see [ProcessOutcome] for
    /// the skip cases. `buffers` is processed in place.
    pub fn process(&self, frames: usize, buffers: &mut [&mut [f32]]) -> ProcessOutcome {
        self.shared.process(frames, buffers)
    }
}
