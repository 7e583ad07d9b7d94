// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

// A deterministic compiler backend for the integration tests. It recognizes
// a handful of fixed programs and fails everything else with a syntax error,
// which is all the lifecycle machinery needs to be exercised.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotswap_dsp::*;
use synfx_dsp::AtomicFloat;

/// Records teardown order of factories and units across generations.
pub type DropLog = Arc<Mutex<Vec<String>>>;

pub fn new_drop_log() -> DropLog {
    Arc::new(Mutex::new(vec![]))
}

/// Source text for a mono passthrough.
pub const SRC_PASS_1: &str = "process = _;";
/// Source text for a stereo passthrough.
pub const SRC_PASS_2: &str = "process = _,_;";
/// Source text for a stereo fixed gain of 0.5.
pub const SRC_GAIN_HALF: &str = "process = *(0.5), *(0.5);";
/// Source text for a stereo gain driven by an hslider labeled "depth".
pub const SRC_DEPTH: &str = "process = *(hslider(\"depth\", 5, 0, 25, 0.01)), *(hslider(\"depth\", 5, 0, 25, 0.01));";
/// Source that compiles but refuses to instantiate.
pub const SRC_NO_INSTANCE: &str = "process = noinstance;";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Program {
    Pass(usize),
    Scale(f32),
    Depth,
    NoInstance,
}

fn parse(source: &str) -> Result<Program, String> {
    let src = source.trim();
    if src == SRC_PASS_1 {
        Ok(Program::Pass(1))
    } else if src == SRC_PASS_2 {
        Ok(Program::Pass(2))
    } else if src == SRC_GAIN_HALF {
        Ok(Program::Scale(0.5))
    } else if src.contains("hslider(\"depth\"") {
        Ok(Program::Depth)
    } else if src == SRC_NO_INSTANCE {
        Ok(Program::NoInstance)
    } else if src.is_empty() {
        Err("syntax error: empty program".to_string())
    } else {
        Err(format!("syntax error: unexpected program '{}'", src))
    }
}

pub struct TestBackend {
    compile_delay: Duration,
    drop_log: Option<DropLog>,
    pub init_count: Arc<AtomicUsize>,
    pub clear_count: Arc<AtomicUsize>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self {
            compile_delay: Duration::ZERO,
            drop_log: None,
            init_count: Arc::new(AtomicUsize::new(0)),
            clear_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every compile take at least `delay` of wall clock time.
    pub fn with_delay(delay: Duration) -> Self {
        let mut backend = Self::new();
        backend.compile_delay = delay;
        backend
    }

    pub fn with_drop_log(log: DropLog) -> Self {
        let mut backend = Self::new();
        backend.drop_log = Some(log);
        backend
    }
}

impl DspBackend for TestBackend {
    fn compile(
        &self,
        _name: &str,
        source: &str,
        _args: &[String],
    ) -> Result<Box<dyn DspFactory>, DspError> {
        if !self.compile_delay.is_zero() {
            std::thread::sleep(self.compile_delay);
        }

        let program = parse(source).map_err(DspError::Compile)?;
        Ok(Box::new(TestFactory {
            program,
            drop_log: self.drop_log.clone(),
            init_count: self.init_count.clone(),
            clear_count: self.clear_count.clone(),
        }))
    }
}

pub struct TestFactory {
    program: Program,
    drop_log: Option<DropLog>,
    init_count: Arc<AtomicUsize>,
    clear_count: Arc<AtomicUsize>,
}

impl DspFactory for TestFactory {
    fn create_instance(&self) -> Option<Box<dyn CompiledUnit>> {
        let behavior = match self.program {
            Program::Pass(channels) => Behavior::Pass(channels),
            Program::Scale(gain) => Behavior::Scale(gain),
            Program::Depth => Behavior::Depth(Arc::new(AtomicFloat::new(5.0))),
            Program::NoInstance => return None,
        };

        Some(Box::new(TestUnit {
            behavior,
            drop_log: self.drop_log.clone(),
            init_count: self.init_count.clone(),
            clear_count: self.clear_count.clone(),
        }))
    }
}

impl Drop for TestFactory {
    fn drop(&mut self) {
        if let Some(log) = &self.drop_log {
            log.lock().unwrap().push("factory".to_string());
        }
    }
}

enum Behavior {
    Pass(usize),
    Scale(f32),
    Depth(Zone),
}

pub struct TestUnit {
    behavior: Behavior,
    drop_log: Option<DropLog>,
    init_count: Arc<AtomicUsize>,
    clear_count: Arc<AtomicUsize>,
}

impl CompiledUnit for TestUnit {
    fn num_inputs(&self) -> usize {
        match &self.behavior {
            Behavior::Pass(channels) => *channels,
            _ => 2,
        }
    }

    fn num_outputs(&self) -> usize {
        self.num_inputs()
    }

    fn init(&mut self, _sample_rate: f64) {
        self.init_count.fetch_add(1, Ordering::SeqCst);
    }

    fn instance_clear(&mut self) {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
    }

    fn compute(&mut self, frames: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let gain = match &self.behavior {
            Behavior::Pass(_) => 1.0,
            Behavior::Scale(gain) => *gain,
            Behavior::Depth(zone) => zone.get(),
        };

        for (input, output) in inputs.iter().zip(outputs.iter_mut()) {
            for (i, o) in input[..frames].iter().zip(output[..frames].iter_mut()) {
                *o = *i * gain;
            }
        }
    }

    fn build_user_interface(&mut self, visitor: &mut dyn UiVisitor) {
        if let Behavior::Depth(zone) = &self.behavior {
            visitor.add_horizontal_slider("depth", zone.clone(), 5.0, 0.0, 25.0, 0.01);
        }
    }
}

impl Drop for TestUnit {
    fn drop(&mut self) {
        if let Some(log) = &self.drop_log {
            log.lock().unwrap().push("unit".to_string());
        }
    }
}
