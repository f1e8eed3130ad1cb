// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AnalysisResult, Descriptor, EyeShape, EyeSize, EyeSpacing, Eyes, FaceShape, Features,
    ImageInput, ImageMediaType, Jawline, JawlineShape, LipFullness, Lips, Nose, NoseLength,
    NoseWidth, Skin, SkinMetric, TextContent, MAX_GRADE, MAX_OVERALL_SCORE, SCHEMA_VERSION,
    STYLE_TIP_COUNT,
};
pub use requests::UploadCandidate;
pub use responses::{ApiError, HealthResponse};
