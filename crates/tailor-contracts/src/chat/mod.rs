mod command_registry;
mod commands;
mod decision;
mod prompts;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use commands::{parse_chat_line, ChatCommand};
pub use decision::{parse_decision, ClassificationError, EditDecision, EditIntent};
pub use prompts::{
    classifier_system_prompt, color_prompt, judge_rubric_prompt, sleeve_prompt, variation_prompt,
    BoundingBox, SleeveStyle, LEFT_SLEEVE_BOX, OTHER_PROMPT_SENTINEL, RIGHT_SLEEVE_BOX,
};
