//! Rig collaborator interface and an in-memory rig.
//!
//! A rig owns named, min/max-bounded parameters. Bound values are written
//! and checkpointed with [`Rig::save_parameters`] every tick; the rig's own
//! update restores that checkpoint with [`Rig::load_parameters`] before it
//! layers idle animation on top.

use crate::{parameters::Channel, Error, Result};
use std::f32::consts::TAU;

/// Breath cycle offset, peak, period in seconds and blend weight
const BREATH_OFFSET: f32 = 0.5;
const BREATH_PEAK: f32 = 0.5;
const BREATH_CYCLE_SECS: f32 = 3.8;
const BREATH_WEIGHT: f32 = 0.5;

/// Animatable model driven by parameter values
pub trait Rig {
    /// Number of parameters
    fn parameter_count(&self) -> usize;

    /// Parameter name at `index`
    fn parameter_name(&self, index: usize) -> Option<&str>;

    /// Lower bound of the parameter at `index`
    fn parameter_min(&self, index: usize) -> Option<f32>;

    /// Upper bound of the parameter at `index`
    fn parameter_max(&self, index: usize) -> Option<f32>;

    /// Current value of the parameter at `index`
    fn parameter_value(&self, index: usize) -> Option<f32>;

    /// Write a parameter value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binding`] if `index` is out of range
    fn set_parameter_value(&mut self, index: usize, value: f32) -> Result<()>;

    /// Checkpoint the current values
    fn save_parameters(&mut self);

    /// Restore the last checkpoint
    fn load_parameters(&mut self);

    /// Advance the rig's own animation
    fn update(&mut self, delta_time: f32);

    /// All parameter names in index order, `""` where a name is missing
    fn parameter_names(&self) -> Vec<&str> {
        (0..self.parameter_count())
            .map(|i| self.parameter_name(i).unwrap_or_default())
            .collect()
    }
}

/// Definition of one rig parameter
#[derive(Debug, Clone, PartialEq)]
pub struct RigParameter {
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl RigParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            default,
        }
    }
}

/// In-memory rig with a breath cycle
///
/// Values are clamped to each parameter's range when written.
#[derive(Debug, Clone)]
pub struct StandaloneRig {
    parameters: Vec<RigParameter>,
    values: Vec<f32>,
    saved: Vec<f32>,
    breath: Option<usize>,
    elapsed: f32,
}

impl StandaloneRig {
    #[must_use]
    pub fn new(parameters: Vec<RigParameter>) -> Self {
        let values: Vec<f32> = parameters.iter().map(|p| p.default.clamp(p.min, p.max)).collect();
        let breath = parameters
            .iter()
            .position(|p| p.name == "ParamBreath" || p.name == "PARAM_BREATH");
        Self {
            saved: values.clone(),
            values,
            parameters,
            breath,
            elapsed: 0.0,
        }
    }

    /// Rig with every face channel plus a breath parameter, canonical names
    #[must_use]
    pub fn with_default_parameters() -> Self {
        let mut parameters: Vec<RigParameter> = Channel::ALL
            .iter()
            .map(|&channel| {
                let (min, max, default) = match channel {
                    Channel::AngleX | Channel::AngleY | Channel::AngleZ => (-30.0, 30.0, 0.0),
                    Channel::BodyAngleX | Channel::BodyAngleY | Channel::BodyAngleZ => (-10.0, 10.0, 0.0),
                    Channel::EyeLOpen | Channel::EyeROpen => (0.0, 1.0, 1.0),
                    Channel::EyeLSmile | Channel::EyeRSmile | Channel::EyeForm | Channel::MouthOpenY => {
                        (0.0, 1.0, 0.0)
                    }
                    _ => (-1.0, 1.0, 0.0),
                };
                RigParameter::new(channel.canonical_name(), min, max, default)
            })
            .collect();
        parameters.push(RigParameter::new("ParamBreath", 0.0, 1.0, 0.0));
        Self::new(parameters)
    }

    /// Parameter definition at `index`
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&RigParameter> {
        self.parameters.get(index)
    }

    /// Index of the parameter called `name`
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    fn add_parameter_value(&mut self, index: usize, value: f32, weight: f32) {
        if let (Some(current), Some(p)) = (self.values.get_mut(index), self.parameters.get(index)) {
            *current = value.mul_add(weight, *current).clamp(p.min, p.max);
        }
    }
}

impl Rig for StandaloneRig {
    fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn parameter_name(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(|p| p.name.as_str())
    }

    fn parameter_min(&self, index: usize) -> Option<f32> {
        self.parameters.get(index).map(|p| p.min)
    }

    fn parameter_max(&self, index: usize) -> Option<f32> {
        self.parameters.get(index).map(|p| p.max)
    }

    fn parameter_value(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    fn set_parameter_value(&mut self, index: usize, value: f32) -> Result<()> {
        let p = self
            .parameters
            .get(index)
            .ok_or_else(|| Error::Binding(format!("Rig has no parameter {index}")))?;
        self.values[index] = value.clamp(p.min, p.max);
        Ok(())
    }

    fn save_parameters(&mut self) {
        self.saved.clone_from(&self.values);
    }

    fn load_parameters(&mut self) {
        self.values.clone_from(&self.saved);
    }

    fn update(&mut self, delta_time: f32) {
        self.elapsed += delta_time.max(0.0);
        self.load_parameters();

        if let Some(index) = self.breath {
            let phase = (self.elapsed / BREATH_CYCLE_SECS * TAU).sin();
            self.add_parameter_value(index, BREATH_PEAK.mul_add(phase, BREATH_OFFSET), BREATH_WEIGHT);
        }
    }
}
