//! Parameter smoothing and remapping.
//!
//! Each tick with a detected face, raw metrics are normalized against their
//! configured bounds and the [`ParameterVector`] is moved toward the
//! normalized targets with a frame-rate independent lerp. Body, eye-smile
//! and eyebrow form/angle channels are derived from already smoothed values.

use crate::{
    config::{ChannelBounds, SmoothingConfig},
    cursor_control::PointerSample,
    parameters::{Channel, ParameterVector},
    tracker::FaceSample,
};

/// Lerp speed class of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedClass {
    Slow,
    Medium,
    Fast,
}

/// Linear interpolation from `start` toward `end`
#[must_use]
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    t.mul_add(end - start, start)
}

/// Map `value` so that `bounds.lower` is 0 and `bounds.upper` is 1
///
/// The result is not clamped.
#[must_use]
pub fn normalize(value: f32, bounds: ChannelBounds) -> f32 {
    (value - bounds.lower) / (bounds.upper - bounds.lower)
}

/// Moves the optimized parameter vector toward each new face sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterRemapper {
    config: SmoothingConfig,
}

impl ParameterRemapper {
    #[must_use]
    pub fn new(config: SmoothingConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    pub fn set_equalize_eyes(&mut self, enabled: bool) {
        self.config.equalize_eyes = enabled;
    }

    pub fn set_eyeball_follow_cursor(&mut self, enabled: bool) {
        self.config.eyeball_follow_cursor = enabled;
    }

    /// Lerp rate of a speed class in 1/s
    #[must_use]
    pub fn rate(&self, speed: SpeedClass) -> f32 {
        match speed {
            SpeedClass::Slow => self.config.rate_slow,
            SpeedClass::Medium => self.config.rate_medium,
            SpeedClass::Fast => self.config.rate_fast,
        }
    }

    /// Move one channel toward `target`
    ///
    /// A non-finite target leaves the channel unchanged. The lerp factor is
    /// clamped to [0, 1] so a long frame lands on the target instead of
    /// overshooting it.
    pub fn smooth(&self, vector: &mut ParameterVector, channel: Channel, target: f32, speed: SpeedClass, delta_time: f32) {
        if !target.is_finite() {
            return;
        }
        let t = (delta_time * self.rate(speed)).clamp(0.0, 1.0);
        if t.is_nan() {
            return;
        }
        vector.set(channel, lerp(vector.get(channel), target, t));
    }

    /// Apply one face sample to the vector
    pub fn update(&self, vector: &mut ParameterVector, sample: &FaceSample, delta_time: f32) {
        let c = &self.config;
        let m = &sample.metrics;
        let scale = m.dist_scale;

        // Head and body
        self.smooth(vector, Channel::AngleX, sample.pose.angle_x(), SpeedClass::Slow, delta_time);
        self.smooth(vector, Channel::AngleY, sample.pose.angle_y() * c.angle_y_gain, SpeedClass::Slow, delta_time);
        self.smooth(vector, Channel::AngleZ, sample.pose.angle_z(), SpeedClass::Slow, delta_time);
        vector.set(Channel::BodyAngleX, vector.get(Channel::AngleX) * c.body_angle_x_factor);
        vector.set(Channel::BodyAngleY, vector.get(Channel::AngleY) * c.body_angle_y_factor);
        vector.set(Channel::BodyAngleZ, vector.get(Channel::AngleZ) * c.body_angle_z_factor);

        // Mouth
        let mouth_open = normalize(scale * m.mouth_open_y, c.mouth_open);
        self.smooth(vector, Channel::MouthOpenY, mouth_open, SpeedClass::Fast, delta_time);
        let mouth_form = normalize(scale * m.mouth_form, c.mouth_form);
        self.smooth(vector, Channel::MouthForm, mouth_form, SpeedClass::Fast, delta_time);

        // Eyes
        if c.equalize_eyes {
            self.smooth(vector, Channel::EyeLOpen, normalize(m.ear, c.eye_open), SpeedClass::Medium, delta_time);
            vector.set(Channel::EyeROpen, vector.get(Channel::EyeLOpen));
        } else {
            self.smooth(vector, Channel::EyeLOpen, normalize(m.left_ear, c.eye_open), SpeedClass::Medium, delta_time);
            self.smooth(vector, Channel::EyeROpen, normalize(m.right_ear, c.eye_open), SpeedClass::Medium, delta_time);
        }

        // Looking down narrows the eyes into a smile
        let eye_form = normalize(vector.get(Channel::AngleY), c.eye_form);
        self.smooth(vector, Channel::EyeForm, eye_form, SpeedClass::Medium, delta_time);
        vector.set(Channel::EyeLSmile, vector.get(Channel::EyeForm));
        vector.set(Channel::EyeRSmile, vector.get(Channel::EyeForm));

        // Eyebrows move together
        let brow_l = normalize(scale * m.eye_brow_l_y, c.brow_y);
        let brow_r = normalize(scale * m.eye_brow_r_y, c.brow_y);
        self.smooth(vector, Channel::BrowLY, (brow_l + brow_r) / 2.0, SpeedClass::Slow, delta_time);
        let brow_y = vector.get(Channel::BrowLY);
        let brow_form = brow_y.min(0.0);
        vector.set(Channel::BrowRY, brow_y);
        vector.set(Channel::BrowLForm, brow_form);
        vector.set(Channel::BrowRForm, brow_form);
        vector.set(Channel::BrowLAngle, brow_form);
        vector.set(Channel::BrowRAngle, brow_form);
    }

    /// Point the eyeballs at the desktop pointer
    pub fn update_eyeballs(&self, vector: &mut ParameterVector, pointer: &PointerSample) {
        if let Some((x, y)) = pointer.eyeball_target() {
            vector.set(Channel::EyeBallX, x);
            vector.set(Channel::EyeBallY, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 10.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 1.0), 10.0);
        assert!((lerp(2.0, 4.0, 0.25) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_is_not_clamped() {
        let bounds = ChannelBounds::new(3.5, 14.0);
        assert_eq!(normalize(3.5, bounds), 0.0);
        assert_eq!(normalize(14.0, bounds), 1.0);
        assert!(normalize(20.0, bounds) > 1.0);
        assert!(normalize(0.0, bounds) < 0.0);
    }

    #[test]
    fn test_smooth_skips_non_finite_target() {
        let remapper = ParameterRemapper::default();
        let mut vector = ParameterVector::new();
        vector.set(Channel::MouthOpenY, 0.3);
        remapper.smooth(&mut vector, Channel::MouthOpenY, f32::NAN, SpeedClass::Fast, 0.016);
        remapper.smooth(&mut vector, Channel::MouthOpenY, f32::INFINITY, SpeedClass::Fast, 0.016);
        assert_eq!(vector.get(Channel::MouthOpenY), 0.3);
    }

    #[test]
    fn test_long_frame_lands_on_target() {
        let remapper = ParameterRemapper::default();
        let mut vector = ParameterVector::new();
        remapper.smooth(&mut vector, Channel::AngleX, 12.0, SpeedClass::Slow, 5.0);
        assert_eq!(vector.get(Channel::AngleX), 12.0);
    }

    #[test]
    fn test_rates() {
        let remapper = ParameterRemapper::default();
        assert!(remapper.rate(SpeedClass::Slow) < remapper.rate(SpeedClass::Medium));
        assert!(remapper.rate(SpeedClass::Medium) < remapper.rate(SpeedClass::Fast));
    }

    proptest! {
        #[test]
        fn prop_smooth_contracts_toward_target(
            start in -100.0f32..100.0,
            target in -100.0f32..100.0,
            dt in 0.0f32..0.2,
        ) {
            let remapper = ParameterRemapper::default();
            let mut vector = ParameterVector::new();
            vector.set(Channel::AngleZ, start);
            remapper.smooth(&mut vector, Channel::AngleZ, target, SpeedClass::Medium, dt);
            let after = vector.get(Channel::AngleZ);
            prop_assert!((after - target).abs() <= (start - target).abs() + 1e-4);
        }
    }
}
