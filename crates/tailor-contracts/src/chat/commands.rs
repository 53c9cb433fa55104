use super::command_registry::{CommandSpec, HELP_COMMAND, MODEL_COMMANDS, QUIT_COMMANDS};
use crate::models::ModelRole;

/// One line typed into the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Help,
    Quit,
    SetModel { role: ModelRole, model: String },
    Unknown { command: String, arg: String },
    Edit(String),
}

fn find_model_role(command: &str, specs: &[CommandSpec]) -> Option<ModelRole> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.role)
}

pub fn parse_chat_line(text: &str) -> ChatCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return ChatCommand::Edit(raw_trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return ChatCommand::Edit(raw_trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if command == HELP_COMMAND {
        return ChatCommand::Help;
    }
    if QUIT_COMMANDS.contains(&command.as_str()) {
        return ChatCommand::Quit;
    }
    if let Some(role) = find_model_role(&command, MODEL_COMMANDS) {
        if !arg.is_empty() {
            return ChatCommand::SetModel {
                role,
                model: arg.to_string(),
            };
        }
    }
    ChatCommand::Unknown {
        command,
        arg: arg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_chat_line, ChatCommand};
    use crate::models::ModelRole;

    #[test]
    fn plain_text_is_an_edit_request() {
        assert_eq!(
            parse_chat_line("  make sleeves full  "),
            ChatCommand::Edit("make sleeves full".to_string())
        );
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_chat_line("   "), ChatCommand::Noop);
    }

    #[test]
    fn model_commands_bind_roles() {
        assert_eq!(
            parse_chat_line("/judge_model dryrun-judge-1"),
            ChatCommand::SetModel {
                role: ModelRole::Judge,
                model: "dryrun-judge-1".to_string(),
            }
        );
        assert_eq!(
            parse_chat_line("/TEXT_MODEL openai/gpt-4o-mini"),
            ChatCommand::SetModel {
                role: ModelRole::Text,
                model: "openai/gpt-4o-mini".to_string(),
            }
        );
    }

    #[test]
    fn model_command_without_argument_is_unknown() {
        assert_eq!(
            parse_chat_line("/image_model"),
            ChatCommand::Unknown {
                command: "image_model".to_string(),
                arg: String::new(),
            }
        );
    }

    #[test]
    fn help_and_quit() {
        assert_eq!(parse_chat_line("/help"), ChatCommand::Help);
        assert_eq!(parse_chat_line("/quit"), ChatCommand::Quit);
        assert_eq!(parse_chat_line("/exit"), ChatCommand::Quit);
    }

    #[test]
    fn bare_slash_is_treated_as_text() {
        assert_eq!(parse_chat_line("/ red"), ChatCommand::Edit("/ red".to_string()));
    }
}
