pub mod candidates;
pub mod score_text;
