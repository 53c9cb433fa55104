use crate::models::ModelRole;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub role: ModelRole,
}

/// Commands that take a model name and rebind one pipeline role.
pub(crate) const MODEL_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "text_model",
        role: ModelRole::Text,
    },
    CommandSpec {
        command: "image_model",
        role: ModelRole::Image,
    },
    CommandSpec {
        command: "judge_model",
        role: ModelRole::Judge,
    },
];

pub(crate) const HELP_COMMAND: &str = "help";

pub(crate) const QUIT_COMMANDS: &[&str] = &["quit", "exit"];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/text_model",
    "/image_model",
    "/judge_model",
    "/quit",
];
