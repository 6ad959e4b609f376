use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag a bundle must carry to be restored as the VGG16 encoder.
pub const VGG_TAG: &str = "vgg16";

#[derive(Debug, Error, PartialEq)]
pub enum ManifestError {
    #[error("bundle tag {found:?} does not match expected {expected:?}")]
    TagMismatch { expected: String, found: String },
    #[error("endpoint {slot} is named {found:?}, expected {expected:?}")]
    UnexpectedEndpoint {
        slot: &'static str,
        expected: String,
        found: String,
    },
    #[error("backbone stage {stage} has zero width")]
    ZeroWidth { stage: usize },
    #[error("fc kernel must be odd and non-zero, got {0}")]
    InvalidFcKernel(usize),
    #[error("weights stem is empty")]
    MissingWeights,
    #[error("class count must be at least 1")]
    NoClasses,
    #[error("image shape {0:?} is not a positive multiple of 32")]
    InvalidImageShape([usize; 2]),
    #[error("frame rate must be finite and positive, got {0}")]
    InvalidFps(f64),
    #[error("frame entry {0} has an empty file name")]
    EmptyFrameName(usize),
}

/// Names under which a bundle exposes its five capability handles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointNames {
    pub image_input: String,
    pub keep_prob: String,
    pub layer3_out: String,
    pub layer4_out: String,
    pub layer7_out: String,
}

impl Default for EndpointNames {
    fn default() -> Self {
        Self {
            image_input: "image_input".into(),
            keep_prob: "keep_prob".into(),
            layer3_out: "layer3_out".into(),
            layer4_out: "layer4_out".into(),
            layer7_out: "layer7_out".into(),
        }
    }
}

impl EndpointNames {
    /// (slot, name) pairs in the fixed endpoint order.
    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("image_input", self.image_input.as_str()),
            ("keep_prob", self.keep_prob.as_str()),
            ("layer3_out", self.layer3_out.as_str()),
            ("layer4_out", self.layer4_out.as_str()),
            ("layer7_out", self.layer7_out.as_str()),
        ]
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let expected = Self::default();
        for ((slot, found), (_, want)) in self.pairs().into_iter().zip(expected.pairs()) {
            if found != want {
                return Err(ManifestError::UnexpectedEndpoint {
                    slot,
                    expected: want.to_string(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Widths of a VGG16-style backbone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackboneSpec {
    /// Output channels of the five conv stages.
    pub stage_widths: [usize; 5],
    /// Channels of the fc6/fc7 convolutions.
    pub fc_width: usize,
    /// Square kernel of fc6.
    pub fc_kernel: usize,
}

impl Default for BackboneSpec {
    fn default() -> Self {
        Self {
            stage_widths: [64, 128, 256, 512, 512],
            fc_width: 4096,
            fc_kernel: 7,
        }
    }
}

impl BackboneSpec {
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (stage, width) in self.stage_widths.iter().enumerate() {
            if *width == 0 {
                return Err(ManifestError::ZeroWidth { stage: stage + 1 });
            }
        }
        if self.fc_width == 0 {
            return Err(ManifestError::ZeroWidth { stage: 6 });
        }
        if self.fc_kernel == 0 || self.fc_kernel % 2 == 0 {
            return Err(ManifestError::InvalidFcKernel(self.fc_kernel));
        }
        Ok(())
    }
}

/// `saved_model.json` at the root of an encoder bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderManifest {
    pub tag: String,
    pub endpoints: EndpointNames,
    pub backbone: BackboneSpec,
    /// File stem of the weight record, relative to the bundle root.
    pub weights: String,
}

impl Default for EncoderManifest {
    fn default() -> Self {
        Self {
            tag: VGG_TAG.to_string(),
            endpoints: EndpointNames::default(),
            backbone: BackboneSpec::default(),
            weights: "variables".to_string(),
        }
    }
}

impl EncoderManifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.tag != VGG_TAG {
            return Err(ManifestError::TagMismatch {
                expected: VGG_TAG.to_string(),
                found: self.tag.clone(),
            });
        }
        if self.weights.trim().is_empty() {
            return Err(ManifestError::MissingWeights);
        }
        self.endpoints.validate()?;
        self.backbone.validate()
    }
}
