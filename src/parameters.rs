//! Logical parameter channels and the optimized parameter vector.
//!
//! A [`Channel`] is one animatable quantity the face drives. Rigs name their
//! parameters in one of two historical conventions (`PARAM_ANGLE_X` and
//! `ParamAngleX`); [`Channel::from_rig_name`] accepts both.

use std::fmt;

/// Face-driven parameter channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    AngleX,
    AngleY,
    AngleZ,
    BodyAngleX,
    BodyAngleY,
    BodyAngleZ,
    EyeLOpen,
    EyeROpen,
    EyeLSmile,
    EyeRSmile,
    EyeForm,
    EyeBallX,
    EyeBallY,
    MouthOpenY,
    MouthForm,
    BrowLY,
    BrowRY,
    BrowLForm,
    BrowRForm,
    BrowLAngle,
    BrowRAngle,
}

impl Channel {
    /// Number of channels
    pub const COUNT: usize = 21;

    /// Every channel in declaration order
    pub const ALL: [Self; Self::COUNT] = [
        Self::AngleX,
        Self::AngleY,
        Self::AngleZ,
        Self::BodyAngleX,
        Self::BodyAngleY,
        Self::BodyAngleZ,
        Self::EyeLOpen,
        Self::EyeROpen,
        Self::EyeLSmile,
        Self::EyeRSmile,
        Self::EyeForm,
        Self::EyeBallX,
        Self::EyeBallY,
        Self::MouthOpenY,
        Self::MouthForm,
        Self::BrowLY,
        Self::BrowRY,
        Self::BrowLForm,
        Self::BrowRForm,
        Self::BrowLAngle,
        Self::BrowRAngle,
    ];

    /// Position in [`Channel::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parameter name in the current rig naming convention
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::AngleX => "ParamAngleX",
            Self::AngleY => "ParamAngleY",
            Self::AngleZ => "ParamAngleZ",
            Self::BodyAngleX => "ParamBodyAngleX",
            Self::BodyAngleY => "ParamBodyAngleY",
            Self::BodyAngleZ => "ParamBodyAngleZ",
            Self::EyeLOpen => "ParamEyeLOpen",
            Self::EyeROpen => "ParamEyeROpen",
            Self::EyeLSmile => "ParamEyeLSmile",
            Self::EyeRSmile => "ParamEyeRSmile",
            Self::EyeForm => "ParamEyeForm",
            Self::EyeBallX => "ParamEyeBallX",
            Self::EyeBallY => "ParamEyeBallY",
            Self::MouthOpenY => "ParamMouthOpenY",
            Self::MouthForm => "ParamMouthForm",
            Self::BrowLY => "ParamBrowLY",
            Self::BrowRY => "ParamBrowRY",
            Self::BrowLForm => "ParamBrowLForm",
            Self::BrowRForm => "ParamBrowRForm",
            Self::BrowLAngle => "ParamBrowLAngle",
            Self::BrowRAngle => "ParamBrowRAngle",
        }
    }

    /// Channel driven by a rig parameter name, if any
    ///
    /// Any name starting with `ParamMouthOpen` drives [`Channel::MouthOpenY`].
    #[must_use]
    pub fn from_rig_name(name: &str) -> Option<Self> {
        let channel = match name {
            "PARAM_ANGLE_X" | "ParamAngleX" => Self::AngleX,
            "PARAM_ANGLE_Y" | "ParamAngleY" => Self::AngleY,
            "PARAM_ANGLE_Z" | "ParamAngleZ" => Self::AngleZ,
            "PARAM_BODY_ANGLE_X" | "ParamBodyAngleX" => Self::BodyAngleX,
            "PARAM_BODY_ANGLE_Y" | "ParamBodyAngleY" => Self::BodyAngleY,
            "PARAM_BODY_ANGLE_Z" | "ParamBodyAngleZ" => Self::BodyAngleZ,
            "PARAM_EYE_L_OPEN" | "ParamEyeLOpen" => Self::EyeLOpen,
            "PARAM_EYE_R_OPEN" | "ParamEyeROpen" => Self::EyeROpen,
            "PARAM_EYE_L_SMILE" | "PARAM_EYE_L_FORM" | "ParamEyeLSmile" => Self::EyeLSmile,
            "PARAM_EYE_R_SMILE" | "PARAM_EYE_R_FORM" | "ParamEyeRSmile" => Self::EyeRSmile,
            "PARAM_EYE_FORM" | "ParamEyeForm" => Self::EyeForm,
            "PARAM_EYE_BALL_X" | "ParamEyeBallX" => Self::EyeBallX,
            "PARAM_EYE_BALL_Y" | "ParamEyeBallY" => Self::EyeBallY,
            "PARAM_MOUTH_OPEN_Y" => Self::MouthOpenY,
            name if name.starts_with("ParamMouthOpen") => Self::MouthOpenY,
            "PARAM_MOUTH_FORM" | "ParamMouthForm" => Self::MouthForm,
            "PARAM_BROW_L_Y" | "ParamBrowLY" => Self::BrowLY,
            "PARAM_BROW_R_Y" | "ParamBrowRY" => Self::BrowRY,
            "PARAM_BROW_L_FORM" | "ParamBrowLForm" => Self::BrowLForm,
            "PARAM_BROW_R_FORM" | "ParamBrowRForm" => Self::BrowRForm,
            "PARAM_BROW_L_ANGLE" | "ParamBrowLAngle" => Self::BrowLAngle,
            "PARAM_BROW_R_ANGLE" | "ParamBrowRAngle" => Self::BrowRAngle,
            _ => return None,
        };
        Some(channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Smoothed value of every channel, persistent across frames
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParameterVector {
    values: [f32; Channel::COUNT],
}

impl ParameterVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: f32) {
        self.values[channel.index()] = value;
    }

    /// (channel, value) pairs in channel order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.iter().map(|&c| (c, self.values[c.index()]))
    }
}

/// Rig parameter index for each channel of the loaded rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelIndex {
    indices: [Option<usize>; Channel::COUNT],
}

impl ChannelIndex {
    /// Match rig parameter names, in rig order, against the channel table
    ///
    /// When several names match one channel the last one wins.
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::default();
        for (i, name) in names.into_iter().enumerate() {
            if let Some(channel) = Channel::from_rig_name(name) {
                index.indices[channel.index()] = Some(i);
            }
        }
        index
    }

    /// Rig index driven by `channel`
    #[must_use]
    pub fn get(&self, channel: Channel) -> Option<usize> {
        self.indices[channel.index()]
    }

    /// Rig index as a signed slot, `-1` when the rig lacks the channel
    #[must_use]
    pub fn slot(&self, channel: Channel) -> i32 {
        self.get(channel)
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(-1)
    }

    /// Channels the rig provides, with their rig indices
    pub fn iter(&self) -> impl Iterator<Item = (Channel, usize)> + '_ {
        Channel::ALL
            .iter()
            .filter_map(|&c| self.indices[c.index()].map(|i| (c, i)))
    }

    /// Number of matched channels
    #[must_use]
    pub fn matched(&self) -> usize {
        self.indices.iter().filter(|i| i.is_some()).count()
    }
}
