//! The deferred image handle operations work on.
//!
//! Operations from the [registry](super::operations) do not touch pixels.
//! They append [`Step`]s to a [`Pipeline`] and set its quality. The
//! [backend](super::backend) then decodes the source once, replays the steps
//! and encodes the result. So an operation can be tested by inspecting the
//! pipeline it built, without decoding any images.

/// Largest width or height, in pixels, a variant may be rendered at.
pub const MAX_DIMENSION: u32 = 8192;

/// Quality setting for lossy encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// One transformation, in the order it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Scale preserving aspect ratio. A missing side is unconstrained; with
    /// both sides given the image is fitted inside the box.
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Cut the centered `width`×`height` region. If the image is smaller in
    /// either direction it is padded, centered, up to the exact size.
    CenterCrop { width: u32, height: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<Step>,
    quality: Option<Quality>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resize(&mut self, width: Option<u32>, height: Option<u32>) -> &mut Self {
        self.steps.push(Step::Resize { width, height });
        self
    }

    pub fn center_crop(&mut self, width: u32, height: u32) -> &mut Self {
        self.steps.push(Step::CenterCrop { width, height });
        self
    }

    pub fn quality(&mut self, quality: Quality) -> &mut Self {
        self.quality = Some(quality);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Quality to encode with; the backend default applies when unset.
    pub fn encode_quality(&self) -> Option<Quality> {
        self.quality
    }
}
