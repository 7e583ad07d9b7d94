// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

/*!
Hot swappable, JIT compiled DSP units for real time audio graphs.

This crate manages the lifecycle of dynamically compiled signal processing
objects: user supplied source text goes through an opaque compiler backend
([DspBackend]), the resulting unit is installed atomically in place of the
previous one while an audio callback may be running concurrently, and the
unit's declared controls are mirrored into a host parameter tree.

The three moving parts:

- [DspLifecycle] / [DspProcessor]: the control thread and audio thread
  handles around one "currently active" [CompiledUnit]. The audio thread
  never blocks: a recompilation costs at most a skipped block.
- [UiRecorder]: discovers a unit's controls through the [UiVisitor]
  callback protocol and maps them to host parameter specs.
- [DspNode]: the node graph facade: class selection, source file
  resolution, parameter publication.

```
use hotswap_dsp::*;

struct Pass;
impl CompiledUnit for Pass {
    fn num_inputs(&self) -> usize { 2 }
    fn num_outputs(&self) -> usize { 2 }
    fn init(&mut self, _sample_rate: f64) {}
    fn instance_clear(&mut self) {}
    fn compute(&mut self, frames: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        for (i, o) in inputs.iter().zip(outputs.iter_mut()) {
            o[..frames].copy_from_slice(&i[..frames]);
        }
    }
    fn build_user_interface(&mut self, _visitor: &mut dyn UiVisitor) {}
}

struct PassFactory;
impl DspFactory for PassFactory {
    fn create_instance(&self) -> Option<Box<dyn CompiledUnit>> { Some(Box::new(Pass)) }
}

struct PassBackend;
impl DspBackend for PassBackend {
    fn compile(&self, _name: &str, _source: &str, _args: &[String])
        -> Result<Box<dyn DspFactory>, DspError>
    {
        Ok(Box::new(PassFactory))
    }
}

let mut lifecycle = DspLifecycle::new("demo", Box::new(PassBackend));
let processor = lifecycle.processor();

// audio thread side:
processor.prepare(PrepareSpecs { sample_rate: 48000.0, block_size: 4, num_channels: 2 });

// control thread side:
lifecycle.setup("process = _,_;").unwrap();

let mut left = [1.0_f32, 2.0, 3.0, 4.0];
let mut right = [5.0_f32, 6.0, 7.0, 8.0];
let mut buffers: Vec<&mut [f32]> = vec![&mut left, &mut right];
assert_eq!(processor.process(4, &mut buffers), ProcessOutcome::Processed);
assert_eq!(left, [1.0, 2.0, 3.0, 4.0]);
```

The concurrency contract in one sentence: `setup` compiles without the state
lock, installs under it and retires the old unit after releasing it, while
`process` only ever try-locks, so the audio thread observes either the old
unit or the new one, fully initialized, and never waits for a compile.
*/

mod backend;
mod buffer;
mod error;
mod node;
mod registry;
mod ui;
mod wrapper;

pub use backend::{CompiledUnit, DspBackend, DspFactory};
pub use buffer::ChannelBuffer;
pub use error::DspError;
pub use node::{DspNode, NodePhase, ParameterHost, PropertyStore, CLASS_ID_KEY};
pub use registry::{CodeRegistry, SharedCodeRegistry, SourceResolver};
pub use ui::{
    ControlDescriptor, ControlKind, ControlSet, HostParameterSpec, UiRecorder, UiVisitor, Zone,
    ZoneWriter,
};
pub use wrapper::{CompilationArtifact, DspLifecycle, DspProcessor, PrepareSpecs, ProcessOutcome};
