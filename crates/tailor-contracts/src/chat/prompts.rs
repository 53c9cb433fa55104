use std::fmt;

/// Prompt returned by the classifier for requests it cannot serve.
pub const OTHER_PROMPT_SENTINEL: &str = "none";

/// Pixel rectangle `(x0, y0, x1, y1)` on the fixed source photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

pub const LEFT_SLEEVE_BOX: BoundingBox = BoundingBox {
    x0: 90,
    y0: 50,
    x1: 170,
    y1: 130,
};

pub const RIGHT_SLEEVE_BOX: BoundingBox = BoundingBox {
    x0: 290,
    y0: 60,
    x1: 360,
    y1: 130,
};

const FABRIC_CLAUSE: &str =
    "the same maroon velvet fabric and intricate golden embroidered design pattern";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SleeveStyle {
    FullLength,
    Sleeveless,
    Custom(String),
}

fn sleeve_suffix() -> String {
    format!(
        "Keep everything else in the image completely unchanged, including alignment, size, \
background, and colors. Use the following precise bounding boxes for sleeve inpainting: \
Left sleeve: {LEFT_SLEEVE_BOX} Right sleeve: {RIGHT_SLEEVE_BOX}. Maintain the original style \
and fabric look of the frock. Ensure the edit is seamless and visually consistent with the \
rest of the garment. Do not modify any other part of the image."
    )
}

pub fn sleeve_prompt(style: &SleeveStyle) -> String {
    let lead = match style {
        SleeveStyle::FullLength => format!(
            "Extend the short puff sleeves of the frock to full-length sleeves while keeping \
{FABRIC_CLAUSE} matching the bodice style."
        ),
        SleeveStyle::Sleeveless => format!(
            "Remove the short puff sleeves of the frock while maintaining {FABRIC_CLAUSE} on \
the bodice."
        ),
        SleeveStyle::Custom(name) => format!(
            "Change the sleeves of the frock to {} sleeves while keeping {FABRIC_CLAUSE} \
matching the bodice style.",
            name.trim()
        ),
    };
    format!("{lead} {}", sleeve_suffix())
}

pub fn color_prompt(color: &str) -> String {
    format!(
        "Change the color of the frock to {}, keeping the structure, embroidery design, sleeve \
pattern, skirt layout, fabric texture, and overall alignment exactly the same. Do not alter \
any other visual element except the color.",
        color.trim()
    )
}

/// Tags a base prompt so each parallel request differs textually.
pub fn variation_prompt(base: &str, ordinal: u32) -> String {
    format!("{base} (variation {ordinal})")
}

pub fn classifier_system_prompt() -> String {
    format!(
        "You are an intent detection and prompt rephrasing system for an image editing \
assistant. The assistant helps modify images of frocks. It only supports:
1. Sleeve edits (like making sleeves full length, making sleeveless, changing sleeve styles)
2. Frock color changes

Your job:
- Detect if the user's request is about sleeves, color, or other.
- Rephrase the request into a precise image editing prompt.
- For 'sleeve', match to one of the sleeve types below and return the corresponding base prompt:
    a. Full-length sleeves
    b. Sleeveless
    c. Custom (e.g., cap sleeves, bell sleeves, etc.)
- For 'color', extract the color user wants and place it in the color base prompt.
- For 'other', return prompt as \"{OTHER_PROMPT_SENTINEL}\".

Sleeve base prompts:
- Full-length sleeves:
 \"{full}\"

- Sleeveless:
 \"{sleeveless}\"

- Custom sleeve styles:
 \"{custom}\"

Color base prompt:
\"{color}\"

Respond in JSON format like this:
{{
  \"intent\": \"sleeve\" | \"color\" | \"other\",
  \"prompt\": \"the edited prompt to send to the image model\"
}}",
        full = sleeve_prompt(&SleeveStyle::FullLength),
        sleeveless = sleeve_prompt(&SleeveStyle::Sleeveless),
        custom = sleeve_prompt(&SleeveStyle::Custom("<custom style>".to_string())),
        color = color_prompt("<color>"),
    )
}

/// Rubric sent with the reference and candidate images. The weights are
/// advisory; the judge answers in free text.
pub fn judge_rubric_prompt() -> &'static str {
    "You are a precise image comparison tool. Analyze both images showing a red velvet \
children's frock with gold embroidery. The second image is an edited version where ONLY the \
sleeves should be modified.

Evaluate and score (0-100) how well the edited image preserves the original's key elements, \
based on:

1. Background preservation: Is the background exactly the same? (20 points)
2. Dress structure integrity: Are the following preserved exactly as in original? (50 points total)
   - Bodice presence: Is the bodice part of the dress present at all? (15 points)
   - Bodice design: Is the bodice design maintained AND are the gold embroidery patterns \
preserved in their original design exactly as in the original image? (15 points)
   - Skirt shape, pleating and length (10 points)
   - Gold embroidery on skirt hem (5 points)
   - Overall fabric texture and appearance (5 points)
3. Color accuracy: Is the red velvet color consistent with original? (15 points)
4. Alignment and positioning: Is the dress positioned identically? (15 points)

IGNORE sleeve changes; these are expected.

RESPONSE INSTRUCTIONS:
- Do not explain your answer.
- Do not include any comments, breakdown, or extra text.
- Respond with one line only in this format:

FINAL_SCORE: [number]
"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeve_prompts_carry_both_bounding_boxes() {
        for style in [
            SleeveStyle::FullLength,
            SleeveStyle::Sleeveless,
            SleeveStyle::Custom("bell".to_string()),
        ] {
            let prompt = sleeve_prompt(&style);
            assert!(prompt.contains("Left sleeve: (90, 50, 170, 130)"));
            assert!(prompt.contains("Right sleeve: (290, 60, 360, 130)"));
            assert!(prompt.ends_with("Do not modify any other part of the image."));
        }
    }

    #[test]
    fn custom_sleeve_prompt_names_style() {
        let prompt = sleeve_prompt(&SleeveStyle::Custom("  cap ".to_string()));
        assert!(prompt.starts_with("Change the sleeves of the frock to cap sleeves"));
    }

    #[test]
    fn color_prompt_substitutes_color() {
        let prompt = color_prompt("emerald green");
        assert!(prompt.starts_with("Change the color of the frock to emerald green,"));
    }

    #[test]
    fn variation_prompt_appends_ordinal() {
        assert_eq!(variation_prompt("base", 2), "base (variation 2)");
    }

    #[test]
    fn system_prompt_embeds_every_template() {
        let system = classifier_system_prompt();
        assert!(system.contains(&sleeve_prompt(&SleeveStyle::FullLength)));
        assert!(system.contains(&sleeve_prompt(&SleeveStyle::Sleeveless)));
        assert!(system.contains("<custom style> sleeves"));
        assert!(system.contains(&color_prompt("<color>")));
        assert!(system.contains("return prompt as \"none\""));
    }

    #[test]
    fn rubric_requests_final_score_line() {
        let rubric = judge_rubric_prompt();
        assert!(rubric.contains("(20 points)"));
        assert!(rubric.contains("(50 points total)"));
        assert!(rubric.trim_end().ends_with("FINAL_SCORE: [number]"));
    }
}
