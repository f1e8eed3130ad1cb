use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

/// Version of the analysis contract served by this build.
///
/// Version 2 grades on a 0-10 scale, splits the commentary into a
/// positive and a negative description and accepts up to three views
/// of the same face.
pub const SCHEMA_VERSION: &str = "2";

/// Inclusive upper bound of every cosmetic grade (`wrinkles`, `acne`,
/// `pigmentation`, `jawline.definition`).
pub const MAX_GRADE: u8 = 10;

/// Inclusive upper bound of `skin.overall_score`.
pub const MAX_OVERALL_SCORE: u8 = 100;

/// Maximum number of style tips the model is asked for.
pub const STYLE_TIP_COUNT: usize = 5;

/// Categorical descriptor with a closed set of wire values.
///
/// `ALLOWED` lists the serde names of every variant, in the order they
/// are presented to the model.
pub trait Descriptor {
    const ALLOWED: &'static [&'static str];
}

/// Full analysis returned to the presentation layer
///
/// Deserializing an `AnalysisResult` runs the field validation below, so
/// an out-of-range grade or an empty tip list never produces a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(try_from = "UncheckedAnalysis")]
pub struct AnalysisResult {
    #[validate(nested)]
    pub skin: Skin,
    #[validate(nested)]
    pub features: Features,
    #[validate(nested)]
    pub text: TextContent,
}

#[derive(Deserialize)]
struct UncheckedAnalysis {
    skin: Skin,
    features: Features,
    text: TextContent,
}

impl TryFrom<UncheckedAnalysis> for AnalysisResult {
    type Error = ValidationErrors;

    fn try_from(raw: UncheckedAnalysis) -> Result<Self, Self::Error> {
        let result = AnalysisResult {
            skin: raw.skin,
            features: raw.features,
            text: raw.text,
        };
        result.validate()?;
        Ok(result)
    }
}

/// Graded skin metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Skin {
    #[validate(nested)]
    pub wrinkles: SkinMetric,
    #[validate(nested)]
    pub acne: SkinMetric,
    #[validate(nested)]
    pub pigmentation: SkinMetric,
    #[validate(range(max = 100, message = "an integer from 0 to 100"))]
    pub overall_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SkinMetric {
    #[validate(range(max = 10, message = "an integer from 0 to 10"))]
    pub grade: u8,
    #[validate(custom(function = "non_blank"))]
    pub reason: String,
}

/// Categorical facial feature descriptors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Features {
    pub face_shape: FaceShape,
    #[validate(nested)]
    pub jawline: Jawline,
    pub nose: Nose,
    pub eyes: Eyes,
    pub lips: Lips,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Jawline {
    pub shape: JawlineShape,
    #[validate(range(max = 10, message = "an integer from 0 to 10"))]
    pub definition: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nose {
    pub length: NoseLength,
    pub width: NoseWidth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eyes {
    pub size: EyeSize,
    pub spacing: EyeSpacing,
    pub shape: EyeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lips {
    pub fullness: LipFullness,
}

/// Free-text commentary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TextContent {
    #[validate(custom(function = "non_blank"))]
    pub description_positive: String,
    #[validate(custom(function = "non_blank"))]
    pub description_negative: String,
    #[validate(
        length(min = 1, max = 5, message = "a list of 1 to 5 style tips"),
        custom(function = "non_blank_items")
    )]
    pub style_tips: Vec<String>,
    #[validate(custom(function = "non_blank"))]
    pub disclaimer: String,
}

fn blank() -> ValidationError {
    let mut err = ValidationError::new("blank");
    err.message = Some(Cow::from("a non-empty string"));
    err
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(blank());
    }
    Ok(())
}

fn non_blank_items(items: &[String]) -> Result<(), ValidationError> {
    items.iter().try_for_each(|item| non_blank(item))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceShape {
    Round,
    Oval,
    Square,
    Heart,
    Long,
}

impl Descriptor for FaceShape {
    const ALLOWED: &'static [&'static str] = &["round", "oval", "square", "heart", "long"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JawlineShape {
    Soft,
    Angular,
    Round,
    Square,
}

impl Descriptor for JawlineShape {
    const ALLOWED: &'static [&'static str] = &["soft", "angular", "round", "square"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoseLength {
    Short,
    Average,
    Long,
}

impl Descriptor for NoseLength {
    const ALLOWED: &'static [&'static str] = &["short", "average", "long"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoseWidth {
    Narrow,
    Average,
    Wide,
}

impl Descriptor for NoseWidth {
    const ALLOWED: &'static [&'static str] = &["narrow", "average", "wide"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeSize {
    Small,
    Average,
    Large,
}

impl Descriptor for EyeSize {
    const ALLOWED: &'static [&'static str] = &["small", "average", "large"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EyeSpacing {
    CloseSet,
    Average,
    WideSet,
}

impl Descriptor for EyeSpacing {
    const ALLOWED: &'static [&'static str] = &["close-set", "average", "wide-set"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeShape {
    Round,
    Almond,
    Upturned,
    Downturned,
}

impl Descriptor for EyeShape {
    const ALLOWED: &'static [&'static str] = &["round", "almond", "upturned", "downturned"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LipFullness {
    Subtle,
    Medium,
    Full,
}

impl Descriptor for LipFullness {
    const ALLOWED: &'static [&'static str] = &["subtle", "medium", "full"];
}

/// Accepted image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMediaType {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageMediaType {
    /// Map a declared MIME type onto an accepted format.
    ///
    /// Only the canonical essence is recognised; parameters must already
    /// be stripped by the caller.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// An accepted upload, alive for the duration of one request
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub media_type: ImageMediaType,
}
