use std::fmt;

/// The three model slots of the edit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Intent classification and prompt rephrasing.
    Text,
    /// Streamed image editing.
    Image,
    /// Scoring a candidate against the source.
    Judge,
}

impl ModelRole {
    pub const ALL: [ModelRole; 3] = [Self::Text, Self::Image, Self::Judge];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Judge => "judge",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
