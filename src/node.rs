// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

/*! The graph facing node facade.

[DspNode] ties the pieces together: it resolves a class identifier to a
source file, drives the [DspLifecycle] through recompilations, mirrors the
discovered controls into the host's parameter tree and forwards the real
time entry points. The host side collaborators (parameter tree, property
persistence) stay behind the [ParameterHost] and [PropertyStore] traits.
*/

use std::path::PathBuf;

use crate::backend::DspBackend;
use crate::error::DspError;
use crate::registry::{SharedCodeRegistry, SourceResolver};
use crate::ui::{ControlSet, HostParameterSpec, ZoneWriter};
use crate::wrapper::{DspLifecycle, DspProcessor, PrepareSpecs, ProcessOutcome};

/// Property key under which a node persists its selected class.
pub const CLASS_ID_KEY: &str = "ClassId";

/// The host's parameter tree, reduced to what the node needs: publish a set
/// of parameters with their write-through handles, or clear them all.
///
/// Removal of one generation's parameters always completes before the next
/// generation's are added, so no published parameter ever refers to a
/// retired backing cell.
pub trait ParameterHost: Send {
    fn add_parameter(&mut self, spec: HostParameterSpec, writer: ZoneWriter);
    fn remove_all(&mut self);
}

/// Persisted node properties, so the class choice survives a reload.
pub trait PropertyStore: Send {
    fn store(&mut self, key: &str, value: &str);
    fn load(&self, key: &str) -> Option<String>;
}

/// Where the node stands with respect to its selected class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    /// No class was ever loaded.
    Uninitialized,
    /// Source text was resolved and read, compilation not finished.
    SourceLoaded,
    /// The current class is compiled and installed.
    Compiled,
    /// The last compilation failed; the previous unit (if any) stays active.
    CompileFailed,
}

/// A node-graph DSP node backed by recompilable user source code.
pub struct DspNode {
    type_id: String,
    resolver: SourceResolver,
    registry: SharedCodeRegistry,
    store: Box<dyn PropertyStore>,
    host: Box<dyn ParameterHost>,
    lifecycle: DspLifecycle,
    class_id: String,
    phase: NodePhase,
    last_error: Option<String>,
}

impl DspNode {
    /// Creates the node, ensures the source root directory exists and
    /// immediately attempts to load the persisted class (falling back to
    /// `default_class`). The sample rate is unknown at this point, so the
    /// compiled unit is initialized on the first `prepare`.
    pub fn new(
        type_id: &str,
        default_class: &str,
        root: impl Into<PathBuf>,
        backend: Box<dyn DspBackend>,
        registry: SharedCodeRegistry,
        store: Box<dyn PropertyStore>,
        host: Box<dyn ParameterHost>,
    ) -> Self {
        let resolver = SourceResolver::new(root, "dsp");
        if let Err(e) = resolver.ensure_root() {
            tracing::warn!(error = %e, "could not create DSP source root");
        }

        let mut lifecycle = DspLifecycle::new(type_id, backend);
        lifecycle
            .set_compile_args(vec!["-I".to_string(), resolver.root().display().to_string()]);

        let mut node = Self {
            type_id: type_id.to_string(),
            resolver,
            registry,
            store,
            host,
            lifecycle,
            class_id: String::new(),
            phase: NodePhase::Uninitialized,
            last_error: None,
        };

        let initial = node
            .store
            .load(CLASS_ID_KEY)
            .unwrap_or_else(|| default_class.to_string());
        if let Err(e) = node.set_class(&initial) {
            tracing::warn!(error = %e, "initial class load failed");
        }

        node
    }

    /// Selects a class by identifier: persists the choice, registers it,
    /// loads the source file (creating an empty one if absent) and
    /// recompiles. Selecting the already loaded class is a no-op.
    ///
    /// Only an empty identifier is an error to the caller. Compile and
    /// filesystem failures are non-fatal; they surface through
    /// [DspNode::last_error] and the diagnostics log while the last good
    /// unit keeps running.
    pub fn set_class(&mut self, class_id: &str) -> Result<(), DspError> {
        if class_id.is_empty() {
            return Err(DspError::EmptyClassId);
        }

        self.store.store(CLASS_ID_KEY, class_id);
        self.registry.lock().get_or_create(&self.type_id, class_id);

        if self.class_id == class_id {
            return Ok(());
        }

        // Tear the old host parameters down before the generation their
        // write-through handles point into can be retired.
        self.host.remove_all();
        self.class_id = class_id.to_string();
        self.load_source();
        Ok(())
    }

    /// Re-reads the current class's source file and recompiles, without an
    /// identifier change. On failure the previous unit and its published
    /// parameters are retained.
    pub fn reload(&mut self) {
        if !self.class_id.is_empty() {
            self.load_source();
        }
    }

    fn load_source(&mut self) {
        let path = match self.resolver.resolve(&self.class_id) {
            Ok(path) => path,
            Err(e) => {
                self.phase = NodePhase::CompileFailed;
                self.last_error = Some(e.to_string());
                return;
            }
        };

        if let Err(e) = self.resolver.ensure_exists(&path) {
            // non-fatal: loading will yield an empty source below, which
            // then fails compilation the ordinary way
            tracing::warn!(error = %e, "could not create DSP source file");
        }

        let source = match self.resolver.load(&path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "could not read DSP source file");
                String::new()
            }
        };

        self.phase = NodePhase::SourceLoaded;

        match self.lifecycle.setup(&source) {
            Ok(controls) => {
                self.publish(&controls);
                self.phase = NodePhase::Compiled;
                self.last_error = None;
                tracing::debug!(class = %self.class_id, "DSP class compiled");
            }
            Err(e) => {
                self.phase = NodePhase::CompileFailed;
                self.last_error = Some(e.to_string());
                tracing::error!(class = %self.class_id, error = %e, "DSP compilation failed");
            }
        }
    }

    /// Replaces the published parameter set with the new generation's.
    fn publish(&mut self, controls: &ControlSet) {
        self.host.remove_all();
        for control in controls.controls() {
            self.host
                .add_parameter(control.to_host_parameter(), self.lifecycle.zone_writer(control));
        }
    }

    /// The identifiers this node type can offer in a selection UI.
    pub fn available_classes(&self) -> Vec<String> {
        self.registry.lock().class_list(&self.type_id)
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    /// The diagnostics message of the last failed compilation, if the node
    /// is in [NodePhase::CompileFailed].
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The source file the current class resolves to.
    pub fn source_path(&self) -> Result<PathBuf, DspError> {
        self.resolver.resolve(&self.class_id)
    }

    /// The control set of the installed generation.
    pub fn controls(&self) -> ControlSet {
        self.lifecycle.controls()
    }

    /// Splits off the real time handle for the audio callback thread.
    pub fn processor(&self) -> DspProcessor {
        self.lifecycle.processor()
    }

    // real time entry points, forwarded to the lifecycle

    pub fn prepare(&self, specs: PrepareSpecs) {
        self.lifecycle.prepare(specs);
    }

    pub fn reset(&self) {
        self.lifecycle.reset();
    }

    pub fn process(&self, frames: usize, buffers: &mut [&mut [f32]]) -> ProcessOutcome {
        self.lifecycle.process(frames, buffers)
    }

    /// Single sample path, present for interface uniformity with fixed
    /// function nodes. Block processing is the supported mode; this is a
    /// documented no-op.
    pub fn process_frame(&self, _frame: &mut [f32]) {}
}
