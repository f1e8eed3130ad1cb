use crate::models::{
    Descriptor, EyeShape, EyeSize, EyeSpacing, FaceShape, ImageInput, JawlineShape, LipFullness,
    NoseLength, NoseWidth, MAX_GRADE, MAX_OVERALL_SCORE, STYLE_TIP_COUNT,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Persona and safety constraints sent as the system instruction
pub const SYSTEM_INSTRUCTION: &str = "You act as a cosmetic face analysis assistant.
You always stay positive and respectful.
You give cosmetic insights only.
You never mention diseases.
You never give medical advice or drug names.
You always respond in JSON with a fixed schema.";

const RESPONSE_TEMPLATE: &str = r#"{
  "skin": {
    "wrinkles": { "grade": number, "reason": "string" },
    "acne": { "grade": number, "reason": "string" },
    "pigmentation": { "grade": number, "reason": "string" },
    "overall_score": number
  },
  "features": {
    "face_shape": "string",
    "jawline": { "shape": "string", "definition": number },
    "nose": { "length": "string", "width": "string" },
    "eyes": { "size": "string", "spacing": "string", "shape": "string" },
    "lips": { "fullness": "string" }
  },
  "text": {
    "description_positive": "string",
    "description_negative": "string",
    "style_tips": ["string", "string", "string", "string", "string"],
    "disclaimer": "string"
  }
}"#;

/// Image payload ready for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    /// Standard, padded base64
    pub data: String,
}

/// Provider-agnostic request handed to the model gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system_instruction: &'static str,
    pub user_instruction: String,
    pub images: Vec<EncodedImage>,
}

impl ModelRequest {
    /// Assemble the request for one analysis.
    ///
    /// Pure: the same images always yield the same instruction text and
    /// the same encoded payloads.
    pub fn build(images: &[ImageInput]) -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION,
            user_instruction: user_instruction(images.len()),
            images: images.iter().map(encode_image).collect(),
        }
    }
}

fn encode_image(image: &ImageInput) -> EncodedImage {
    EncodedImage {
        mime_type: image.media_type.as_mime(),
        data: STANDARD.encode(&image.bytes),
    }
}

fn one_of<T: Descriptor>() -> String {
    T::ALLOWED
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the user instruction for `image_count` views of one face.
pub fn user_instruction(image_count: usize) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("Analyze the attached face image");
    prompt.push_str(if image_count > 1 { "s.\n" } else { ".\n" });
    prompt.push_str("Provide cosmetic skin grading and facial feature description.\n");

    if image_count > 1 {
        prompt.push_str(&format!(
            "You are given {} images. They are different angles or views of the same person. \
             Analyze them together and return one single combined result, not one result per image.\n",
            image_count
        ));
    }

    prompt.push_str("Use the following rules:\n\n");

    prompt.push_str("* Skin metrics:\n");
    for metric in ["wrinkles", "acne", "pigmentation"] {
        prompt.push_str(&format!(
            "  * {}.grade integer from 0 to {}\n",
            metric, MAX_GRADE
        ));
    }
    prompt.push_str(&format!(
        "  * overall_score integer from 0 to {}\n\n",
        MAX_OVERALL_SCORE
    ));

    prompt.push_str("* Features:\n");
    prompt.push_str(&format!("  * face_shape: one of {}\n", one_of::<FaceShape>()));
    prompt.push_str(&format!("  * jawline.shape: one of {}\n", one_of::<JawlineShape>()));
    prompt.push_str(&format!(
        "  * jawline.definition: integer from 0 to {}\n",
        MAX_GRADE
    ));
    prompt.push_str(&format!("  * nose.length: one of {}\n", one_of::<NoseLength>()));
    prompt.push_str(&format!("  * nose.width: one of {}\n", one_of::<NoseWidth>()));
    prompt.push_str(&format!("  * eyes.size: one of {}\n", one_of::<EyeSize>()));
    prompt.push_str(&format!("  * eyes.spacing: one of {}\n", one_of::<EyeSpacing>()));
    prompt.push_str(&format!("  * eyes.shape: one of {}\n", one_of::<EyeShape>()));
    prompt.push_str(&format!("  * lips.fullness: one of {}\n\n", one_of::<LipFullness>()));

    prompt.push_str("* Text fields:\n");
    prompt.push_str("  * description_positive: 3-5 sentences highlighting positive aspects and strengths\n");
    prompt.push_str("  * description_negative: 3-5 sentences with constructive feedback on areas for improvement\n");
    prompt.push_str(&format!(
        "  * style_tips: list with {} short styling tips\n",
        STYLE_TIP_COUNT
    ));
    prompt.push_str("  * disclaimer: single sentence that reminds the user that this is cosmetic analysis only\n\n");

    prompt.push_str("Respond with valid JSON that exactly matches this structure and key naming:\n");
    prompt.push_str(RESPONSE_TEMPLATE);
    prompt.push_str("\n\nReturn ONLY the JSON object, no additional text or markdown formatting.");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageMediaType;

    fn image(bytes: &[u8], media_type: ImageMediaType) -> ImageInput {
        ImageInput {
            bytes: bytes.to_vec(),
            media_type,
        }
    }

    #[test]
    fn test_single_image_has_no_multi_view_directive() {
        let request = ModelRequest::build(&[image(b"abc", ImageMediaType::Jpeg)]);
        assert!(!request.user_instruction.contains("same person"));
        assert!(request.user_instruction.starts_with("Analyze the attached face image.\n"));
        assert_eq!(request.images.len(), 1);
    }

    #[test]
    fn test_multi_image_directive() {
        let images = vec![
            image(b"a", ImageMediaType::Jpeg),
            image(b"b", ImageMediaType::Png),
            image(b"c", ImageMediaType::Webp),
        ];
        let request = ModelRequest::build(&images);
        assert!(request.user_instruction.contains("You are given 3 images"));
        assert!(request.user_instruction.contains("same person"));
        assert!(request.user_instruction.contains("not one result per image"));
    }

    #[test]
    fn test_encodes_images_in_order() {
        let images = vec![
            image(b"hello", ImageMediaType::Gif),
            image(&[0xff, 0xd8, 0xff], ImageMediaType::Jpeg),
        ];
        let request = ModelRequest::build(&images);
        assert_eq!(
            request.images,
            vec![
                EncodedImage {
                    mime_type: "image/gif",
                    data: "aGVsbG8=".to_string(),
                },
                EncodedImage {
                    mime_type: "image/jpeg",
                    data: "/9j/".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let images = vec![image(b"x", ImageMediaType::Png), image(b"y", ImageMediaType::Png)];
        assert_eq!(ModelRequest::build(&images), ModelRequest::build(&images));
    }

    #[test]
    fn test_rules_render_value_sets() {
        let text = user_instruction(1);
        assert!(text.contains(r#"eyes.spacing: one of "close-set", "average", "wide-set""#));
        assert!(text.contains(r#"face_shape: one of "round", "oval", "square", "heart", "long""#));
        assert!(text.contains("wrinkles.grade integer from 0 to 10"));
        assert!(text.contains("overall_score integer from 0 to 100"));
        assert!(text.contains("style_tips: list with 5 short styling tips"));
        assert!(text.ends_with("no additional text or markdown formatting."));
    }

    #[test]
    fn test_system_instruction_is_cosmetic_only() {
        let request = ModelRequest::build(&[image(b"a", ImageMediaType::Jpeg)]);
        assert!(request.system_instruction.contains("cosmetic insights only"));
        assert!(request.system_instruction.contains("never mention diseases"));
        assert!(request.system_instruction.contains("JSON"));
    }
}
