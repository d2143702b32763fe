// src/channel.rs - Stain channels and the extraction mode each one uses

use std::fmt;
use std::str::FromStr;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::errors::GliaCensusError;

/// One of the three stain channels of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Blue,
    Green,
    Red,
}

/// Intensity sub-band used by the enhancer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Full,
    Low,
}

/// How contours are reported for a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Only outermost boundaries
    External,
    /// Outer boundaries plus their immediate holes
    TwoLevel,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Blue, Channel::Green, Channel::Red];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Blue => "blue",
            Channel::Green => "green",
            Channel::Red => "red",
        }
    }

    /// Population label used in metrics headers
    pub fn population(self) -> &'static str {
        match self {
            Channel::Blue => "nuclei",
            Channel::Green => "neuron",
            Channel::Red => "microglia",
        }
    }

    /// Red structures enclose background islands, the nuclear and neural stains do not
    pub fn extraction_mode(self) -> ExtractionMode {
        match self {
            Channel::Blue | Channel::Green => ExtractionMode::External,
            Channel::Red => ExtractionMode::TwoLevel,
        }
    }

    /// Sample of this channel in a decoded RGB pixel.
    /// Layer files store blue first, so blue is the last sample after RGB decode.
    #[inline]
    pub fn sample(self, pixel: &Rgb<u8>) -> u8 {
        match self {
            Channel::Blue => pixel[2],
            Channel::Green => pixel[1],
            Channel::Red => pixel[0],
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = GliaCensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" | "b" => Ok(Channel::Blue),
            "green" | "g" => Ok(Channel::Green),
            "red" | "r" => Ok(Channel::Red),
            other => Err(GliaCensusError::UnknownChannel(other.to_string())),
        }
    }
}
