// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

//! Parameter introspection bridge.
//!
//! A freshly compiled [crate::CompiledUnit] is opaque: the only way to learn
//! about its user facing controls is to hand it a [UiVisitor] and let it call
//! back once per declared control. [UiRecorder] is the one visitor this crate
//! ships; it records every control in declaration order as a
//! [ControlDescriptor] which can then be turned into a host parameter spec
//! with [ControlDescriptor::to_host_parameter].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use synfx_dsp::AtomicFloat;

/// A backing cell inside a compiled unit that one control reads or writes.
///
/// Cells are shared atomics rather than raw pointers into the unit, so a
/// descriptor that outlives its unit degrades into a write to an orphaned
/// cell instead of a use-after-free. [ZoneWriter] additionally drops stale
/// writes entirely via its generation tag.
pub type Zone = Arc<AtomicFloat>;

/// The closed set of control kinds a unit can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Button,
    CheckButton,
    VerticalSlider,
    HorizontalSlider,
    NumEntry,
    HorizontalMeter,
    VerticalMeter,
}

impl ControlKind {
    /// Meters are passive: the unit writes them, the host only reads.
    pub fn is_passive(&self) -> bool {
        matches!(self, ControlKind::HorizontalMeter | ControlKind::VerticalMeter)
    }

    /// Buttons and check buttons map to a two valued host parameter.
    pub fn is_toggle(&self) -> bool {
        matches!(self, ControlKind::Button | ControlKind::CheckButton)
    }
}

/// One user facing control discovered during introspection.
///
/// The descriptor set is replaced wholesale whenever a new unit generation is
/// installed; `generation` identifies the unit the `zone` belongs to.
#[derive(Clone)]
pub struct ControlDescriptor {
    pub kind: ControlKind,
    pub label: String,
    pub zone: Zone,
    pub init: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub generation: u64,
}

impl std::fmt::Debug for ControlDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlDescriptor")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("value", &self.zone.get())
            .field("init", &self.init)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("step", &self.step)
            .field("generation", &self.generation)
            .finish()
    }
}

impl ControlDescriptor {
    /// Maps this control onto a host parameter spec. Numeric controls carry
    /// their range/step/default through unchanged; toggles become a two
    /// valued enumerated parameter named "off"/"on".
    pub fn to_host_parameter(&self) -> HostParameterSpec {
        if self.kind.is_toggle() {
            HostParameterSpec {
                label: self.label.clone(),
                min: 0.0,
                max: 1.0,
                step: 1.0,
                default: self.init,
                value_names: Some(vec!["off".to_string(), "on".to_string()]),
            }
        } else {
            HostParameterSpec {
                label: self.label.clone(),
                min: self.min,
                max: self.max,
                step: self.step,
                default: self.init,
                value_names: None,
            }
        }
    }
}

/// Host agnostic description of one parameter tree entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HostParameterSpec {
    pub label: String,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
    pub value_names: Option<Vec<String>>,
}

/// The UI building callback interface a [crate::CompiledUnit] drives.
///
/// One method per control kind. Layout boxes and metadata declarations exist
/// in the backend's UI protocol but carry nothing this crate needs, so they
/// come with ignoring default implementations.
pub trait UiVisitor {
    fn open_box(&mut self, _label: &str) {}
    fn close_box(&mut self) {}
    fn declare(&mut self, _zone: &Zone, _key: &str, _value: &str) {}

    // active controls

    fn add_button(&mut self, label: &str, zone: Zone);
    fn add_check_button(&mut self, label: &str, zone: Zone);
    fn add_vertical_slider(
        &mut self,
        label: &str,
        zone: Zone,
        init: f32,
        min: f32,
        max: f32,
        step: f32,
    );
    fn add_horizontal_slider(
        &mut self,
        label: &str,
        zone: Zone,
        init: f32,
        min: f32,
        max: f32,
        step: f32,
    );
    fn add_num_entry(&mut self, label: &str, zone: Zone, init: f32, min: f32, max: f32, step: f32);

    // passive controls

    fn add_horizontal_meter(&mut self, label: &str, zone: Zone, min: f32, max: f32);
    fn add_vertical_meter(&mut self, label: &str, zone: Zone, min: f32, max: f32);
}

/// Recording visitor: collects [ControlDescriptor]s in declaration order.
pub struct UiRecorder {
    generation: u64,
    controls: Vec<ControlDescriptor>,
}

impl UiRecorder {
    /// `generation` tags every recorded descriptor with the unit generation
    /// that is about to be installed.
    pub fn new(generation: u64) -> Self {
        Self { generation, controls: vec![] }
    }

    fn push(&mut self, kind: ControlKind, label: &str, zone: Zone, init: f32, min: f32, max: f32, step: f32) {
        self.controls.push(ControlDescriptor {
            kind,
            label: label.to_string(),
            zone,
            init,
            min,
            max,
            step,
            generation: self.generation,
        });
    }

    /// Finalizes recording into a [ControlSet].
    pub fn into_set(self) -> ControlSet {
        ControlSet { generation: self.generation, controls: self.controls }
    }
}

impl UiVisitor for UiRecorder {
    fn add_button(&mut self, label: &str, zone: Zone) {
        self.push(ControlKind::Button, label, zone, 0.0, 0.0, 1.0, 1.0);
    }

    fn add_check_button(&mut self, label: &str, zone: Zone) {
        self.push(ControlKind::CheckButton, label, zone, 0.0, 0.0, 1.0, 1.0);
    }

    fn add_vertical_slider(&mut self, label: &str, zone: Zone, init: f32, min: f32, max: f32, step: f32) {
        self.push(ControlKind::VerticalSlider, label, zone, init, min, max, step);
    }

    fn add_horizontal_slider(&mut self, label: &str, zone: Zone, init: f32, min: f32, max: f32, step: f32) {
        self.push(ControlKind::HorizontalSlider, label, zone, init, min, max, step);
    }

    fn add_num_entry(&mut self, label: &str, zone: Zone, init: f32, min: f32, max: f32, step: f32) {
        self.push(ControlKind::NumEntry, label, zone, init, min, max, step);
    }

    fn add_horizontal_meter(&mut self, label: &str, zone: Zone, min: f32, max: f32) {
        self.push(ControlKind::HorizontalMeter, label, zone, 0.0, min, max, 1.0);
    }

    fn add_vertical_meter(&mut self, label: &str, zone: Zone, min: f32, max: f32) {
        self.push(ControlKind::VerticalMeter, label, zone, 0.0, min, max, 1.0);
    }
}

/// The control descriptors of one unit generation.
///
/// Replaced as a whole when a new unit is installed, together with the unit
/// and the scratch buffer.
#[derive(Debug, Clone, Default)]
pub struct ControlSet {
    generation: u64,
    controls: Vec<ControlDescriptor>,
}

impl ControlSet {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn controls(&self) -> &[ControlDescriptor] {
        &self.controls
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Linear scan, first match wins. The backend permits duplicate labels;
    /// label lookups consistently bind to the first declaration.
    pub fn find_by_label(&self, label: &str) -> Option<&ControlDescriptor> {
        self.controls.iter().find(|c| c.label == label)
    }

    /// All labels in declaration order.
    pub fn labels(&self) -> Vec<String> {
        self.controls.iter().map(|c| c.label.clone()).collect()
    }
}

/// Write-through handle from a host parameter into a control's backing cell.
///
/// Carries the generation of the descriptor it was built from. Once a newer
/// unit generation is active the write becomes a no-op, so delayed UI
/// callbacks racing a recompilation can never touch the wrong unit.
#[derive(Clone)]
pub struct ZoneWriter {
    zone: Zone,
    generation: u64,
    active_generation: Arc<AtomicU64>,
}

impl ZoneWriter {
    pub fn new(zone: Zone, generation: u64, active_generation: Arc<AtomicU64>) -> Self {
        Self { zone, generation, active_generation }
    }

    /// Writes `value` into the backing cell, unless this writer is stale.
    /// Returns whether the write happened.
    pub fn write(&self, value: f64) -> bool {
        if self.active_generation.load(Ordering::Acquire) != self.generation {
            return false;
        }
        self.zone.set(value as f32);
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn zone(v: f32) -> Zone {
        Arc::new(AtomicFloat::new(v))
    }

    #[test]
    fn check_slider_round_trip() {
        let mut rec = UiRecorder::new(1);
        rec.add_horizontal_slider("depth", zone(5.0), 5.0, 0.0, 25.0, 0.01);
        let set = rec.into_set();

        let c = set.find_by_label("depth").unwrap();
        assert_eq!(c.kind, ControlKind::HorizontalSlider);
        assert_eq!(c.init, 5.0);
        assert_eq!(c.min, 0.0);
        assert_eq!(c.max, 25.0);
        assert_eq!(c.step, 0.01);

        let p = c.to_host_parameter();
        assert_eq!(p.min, 0.0);
        assert_eq!(p.max, 25.0);
        assert_eq!(p.step, 0.01);
        assert_eq!(p.default, 5.0);
        assert!(p.value_names.is_none());
    }

    #[test]
    fn check_toggle_maps_to_two_valued_parameter() {
        let mut rec = UiRecorder::new(1);
        rec.add_check_button("bypass", zone(0.0));
        let set = rec.into_set();

        let p = set.find_by_label("bypass").unwrap().to_host_parameter();
        assert_eq!(p.min, 0.0);
        assert_eq!(p.max, 1.0);
        assert_eq!(p.step, 1.0);
        assert_eq!(
            p.value_names,
            Some(vec!["off".to_string(), "on".to_string()])
        );
    }

    #[test]
    fn check_duplicate_labels_first_match() {
        let mut rec = UiRecorder::new(1);
        rec.add_horizontal_slider("gain", zone(1.0), 1.0, 0.0, 2.0, 0.1);
        rec.add_vertical_slider("gain", zone(9.0), 9.0, 0.0, 10.0, 1.0);
        let set = rec.into_set();

        let c = set.find_by_label("gain").unwrap();
        assert_eq!(c.kind, ControlKind::HorizontalSlider);
        assert_eq!(c.max, 2.0);
        assert_eq!(set.labels(), vec!["gain".to_string(), "gain".to_string()]);
    }

    #[test]
    fn check_stale_zone_writer_is_noop() {
        let z = zone(1.0);
        let active = Arc::new(AtomicU64::new(3));
        let writer = ZoneWriter::new(z.clone(), 3, active.clone());

        assert!(writer.write(0.25));
        assert_eq!(z.get(), 0.25);

        // a new generation got installed; the old writer must not touch it
        active.store(4, Ordering::Release);
        assert!(!writer.write(0.9));
        assert_eq!(z.get(), 0.25);
    }

    #[test]
    fn check_meters_are_passive() {
        let mut rec = UiRecorder::new(7);
        rec.add_horizontal_meter("level", zone(0.0), -60.0, 0.0);
        let set = rec.into_set();
        assert_eq!(set.generation(), 7);

        let c = set.find_by_label("level").unwrap();
        assert!(c.kind.is_passive());
        assert_eq!(c.min, -60.0);
        assert_eq!(c.max, 0.0);
    }
}
