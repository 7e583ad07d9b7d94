// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

//! The contract an external DSP compiler toolchain has to fulfill.
//!
//! The actual code generator (a Faust style JIT, an ahead-of-time compiled
//! class library, an interpreter) stays a black box behind [DspBackend]:
//! source text goes in, a factory or an error message comes out. Which
//! backend a node uses is decided once, at construction, by handing the
//! lifecycle a `Box<dyn DspBackend>`.

use crate::error::DspError;
use crate::ui::UiVisitor;

/// An opaque compiler toolchain.
pub trait DspBackend: Send {
    /// Compiles `source` into a factory. `name` identifies the program for
    /// diagnostics, `args` are backend specific compile flags (import paths
    /// and the like). On failure the error carries the backend's message
    /// string verbatim.
    fn compile(
        &self,
        name: &str,
        source: &str,
        args: &[String],
    ) -> Result<Box<dyn DspFactory>, DspError>;
}

/// The factory half of one compilation. Keeps the generated code alive;
/// must outlive every instance it created.
pub trait DspFactory: Send {
    /// Instantiates the compiled program. A `None` here despite a successful
    /// compile is the [DspError::Instantiate] case.
    fn create_instance(&self) -> Option<Box<dyn CompiledUnit>>;
}

/// One runnable instance of a compiled user DSP program.
///
/// The channel arity is fixed at compile time. A unit must never be handed
/// to the audio thread before `init` ran with the current sample rate; the
/// [crate::DspLifecycle] takes care of that ordering.
pub trait CompiledUnit: Send {
    fn num_inputs(&self) -> usize;
    fn num_outputs(&self) -> usize;

    /// One time initialization with the sample rate. Called again whenever
    /// the sample rate changes.
    fn init(&mut self, sample_rate: f64);

    /// Clears all internal state (delay lines, filters) without touching
    /// control values.
    fn instance_clear(&mut self);

    /// Processes `frames` samples. `inputs` and `outputs` carry exactly
    /// `num_inputs()` / `num_outputs()` channels of at least `frames`
    /// samples each; `inputs` is guaranteed not to alias `outputs`.
    fn compute(&mut self, frames: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]);

    /// Drives `visitor` once per declared control, in declaration order.
    fn build_user_interface(&mut self, visitor: &mut dyn UiVisitor);
}
