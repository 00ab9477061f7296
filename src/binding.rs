//! Parameter binding registry.
//!
//! Each rig parameter index may be bound to one [`ParameterSource`]. The
//! source is resolved at apply time against whichever value store it names,
//! so rebinding never leaves a binding pointing at a dead owner.

use crate::{
    parameters::{Channel, ChannelIndex, ParameterVector},
    rig::Rig,
};
use std::collections::BTreeMap;

/// Producer of a bound parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSource {
    /// A channel of the optimized parameter vector
    FaceCapture(Channel),
    /// A manual slider, by rig parameter index
    ManualGui(usize),
}

/// Manual slider values, one per rig parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualParameters {
    values: Vec<f32>,
    ranges: Vec<(f32, f32)>,
}

impl ManualParameters {
    /// Sliders initialised from the rig's current values and ranges
    #[must_use]
    pub fn from_rig(rig: &dyn Rig) -> Self {
        let count = rig.parameter_count();
        let mut values = Vec::with_capacity(count);
        let mut ranges = Vec::with_capacity(count);
        for i in 0..count {
            let min = rig.parameter_min(i).unwrap_or(f32::NEG_INFINITY);
            let max = rig.parameter_max(i).unwrap_or(f32::INFINITY);
            values.push(rig.parameter_value(i).unwrap_or(0.0));
            ranges.push((min, max));
        }
        Self { values, ranges }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Move a slider, clamped to the parameter range
    ///
    /// Returns `false` if there is no slider at `index`.
    pub fn set(&mut self, index: usize, value: f32) -> bool {
        match (self.values.get_mut(index), self.ranges.get(index)) {
            (Some(slot), Some(&(min, max))) if value.is_finite() => {
                *slot = value.clamp(min, max);
                true
            }
            _ => false,
        }
    }
}

/// Rig parameter index to value source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    bindings: BTreeMap<usize, ParameterSource>,
}

impl BindingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a rig parameter, replacing any previous source
    ///
    /// A negative index means the rig has no such parameter and is ignored.
    pub fn bind(&mut self, index: i32, source: ParameterSource) {
        if let Ok(index) = usize::try_from(index) {
            self.bindings.insert(index, source);
        }
    }

    /// Remove every binding
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Source bound to a rig parameter
    #[must_use]
    pub fn source_of(&self, index: usize) -> Option<ParameterSource> {
        self.bindings.get(&index).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// (rig index, source) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, ParameterSource)> + '_ {
        self.bindings.iter().map(|(&i, &s)| (i, s))
    }

    /// Bind every parameter of a rig to its own manual slider
    pub fn bind_all_with_gui(&mut self, parameter_count: usize) {
        for index in 0..parameter_count {
            self.bindings.insert(index, ParameterSource::ManualGui(index));
        }
    }

    /// Bind every matched channel to the optimized parameter vector
    pub fn bind_defaults_with_face(&mut self, channels: &ChannelIndex) {
        log::info!("Binding {} rig parameters with face capture", channels.matched());
        for channel in Channel::ALL {
            self.bind(channels.slot(channel), ParameterSource::FaceCapture(channel));
        }
    }

    /// Bind every matched channel back to its manual slider
    pub fn bind_defaults_with_gui(&mut self, channels: &ChannelIndex) {
        log::info!("Binding {} rig parameters with GUI sliders", channels.matched());
        for (_, index) in channels.iter() {
            self.bindings.insert(index, ParameterSource::ManualGui(index));
        }
    }

    /// Resolve the value a source currently supplies
    #[must_use]
    pub fn resolve(source: ParameterSource, face: &ParameterVector, gui: &ManualParameters) -> Option<f32> {
        match source {
            ParameterSource::FaceCapture(channel) => Some(face.get(channel)),
            ParameterSource::ManualGui(index) => gui.get(index),
        }
    }

    /// Write every bound value into the rig, then checkpoint the rig
    ///
    /// Returns the number of values written.
    pub fn apply(&self, rig: &mut dyn Rig, face: &ParameterVector, gui: &ManualParameters) -> usize {
        let mut applied = 0;
        for (&index, &source) in &self.bindings {
            let Some(value) = Self::resolve(source, face, gui) else {
                continue;
            };
            match rig.set_parameter_value(index, value) {
                Ok(()) => applied += 1,
                Err(e) => log::debug!("Skipping binding: {e}"),
            }
        }
        rig.save_parameters();
        applied
    }
}
