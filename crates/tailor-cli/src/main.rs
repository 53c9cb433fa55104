use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tailor_contracts::chat::{parse_chat_line, ChatCommand, CHAT_HELP_COMMANDS};
use tailor_contracts::models::ModelRole;
use tailor_engine::{EditEngine, EditOutcome, EngineConfig, EngineOptions, SLEEVE_VARIANT_COUNT};

const EXIT_EDIT_FAILED: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "tailor-rs", version, about = "Frock sleeve and colour editor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session; each line is an edit request.
    Chat(SessionArgs),
    /// Run a single edit request.
    Edit(EditArgs),
    /// Print the classified intent and prompt without generating.
    Classify(ClassifyArgs),
    /// Judge an existing image against the source.
    Score(ScoreArgs),
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long, default_value = "frockonly.png")]
    source: PathBuf,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "openai/gpt-3.5-turbo-0613")]
    text_model: String,
    #[arg(long, default_value = "gemini-2.0-flash-exp-image-generation")]
    image_model: String,
    #[arg(long, default_value = "gemini-2.0-flash-exp-image-generation")]
    judge_model: String,
}

#[derive(Debug, Args)]
struct EditArgs {
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    #[arg(long)]
    text: String,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Args)]
struct ScoreArgs {
    #[arg(long)]
    candidate: PathBuf,
    #[command(flatten)]
    session: SessionArgs,
}

impl SessionArgs {
    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            source_path: self.source.clone(),
            out_dir: self.out.clone(),
            events_path: self.events.clone(),
            text_model: Some(self.text_model.clone()),
            image_model: Some(self.image_model.clone()),
            judge_model: Some(self.judge_model.clone()),
        }
    }

    fn open_engine(&self) -> Result<EditEngine> {
        let config = EngineConfig::from_env();
        let engine = EditEngine::new(self.engine_options(), &config)?;
        for reason in engine.fallback_reasons() {
            eprintln!("{reason}");
        }
        for warning in engine.credential_warnings(&config) {
            eprintln!("warning: {warning}");
        }
        Ok(engine)
    }
}

fn main() {
    dotenvy::dotenv().ok();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("tailor-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(&args)?;
            Ok(0)
        }
        Command::Edit(args) => run_edit(&args),
        Command::Classify(args) => run_classify(&args),
        Command::Score(args) => run_score(&args),
    }
}

fn run_chat(args: &SessionArgs) -> Result<()> {
    let mut engine = args.open_engine()?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Tailor chat started on {}. Type /help for commands.",
        engine.source().path().display()
    );
    println!(
        "Models: text={} image={} judge={}",
        engine.model(ModelRole::Text),
        engine.model(ModelRole::Image),
        engine.model(ModelRole::Judge)
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_chat_line(line.trim_end_matches(['\n', '\r'])) {
            ChatCommand::Noop => continue,
            ChatCommand::Quit => break,
            ChatCommand::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Anything else is an edit request, e.g. 'make sleeves full'.");
            }
            ChatCommand::SetModel { role, model } => match engine.set_model(role, &model) {
                Ok(fallback) => {
                    if let Some(reason) = fallback {
                        println!("{reason}");
                    }
                    println!("{role} model set to {}", engine.model(role));
                }
                Err(err) => println!("Model change failed: {err:#}"),
            },
            ChatCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}");
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            ChatCommand::Edit(text) => match engine.handle(&text) {
                Ok(outcome) => report_outcome(&outcome),
                Err(err) => println!("Could not understand the request: {err}"),
            },
        }
    }
    Ok(())
}

fn run_edit(args: &EditArgs) -> Result<i32> {
    let engine = args.session.open_engine()?;
    match engine.handle(&args.prompt) {
        Ok(outcome) => {
            report_outcome(&outcome);
            Ok(outcome_exit_code(&outcome))
        }
        Err(err) => {
            eprintln!("Could not understand the request: {err}");
            Ok(EXIT_EDIT_FAILED)
        }
    }
}

fn run_classify(args: &ClassifyArgs) -> Result<i32> {
    let engine = args.session.open_engine()?;
    match engine.classify(&args.text) {
        Ok(decision) => {
            println!(
                "{}",
                json!({ "intent": decision.intent.as_str(), "prompt": decision.prompt })
            );
            Ok(0)
        }
        Err(err) => {
            eprintln!("Classification failed: {err}");
            Ok(EXIT_EDIT_FAILED)
        }
    }
}

fn run_score(args: &ScoreArgs) -> Result<i32> {
    let engine = args.session.open_engine()?;
    match engine.score(&args.candidate) {
        Some(score) => {
            println!("Score: {score:.1}");
            Ok(0)
        }
        None => {
            eprintln!(
                "No score for {}; see {}",
                args.candidate.display(),
                engine.events_path().display()
            );
            Ok(EXIT_EDIT_FAILED)
        }
    }
}

fn outcome_exit_code(outcome: &EditOutcome) -> i32 {
    if outcome.is_failure() {
        EXIT_EDIT_FAILED
    } else {
        0
    }
}

fn outcome_message(outcome: &EditOutcome) -> String {
    match outcome {
        EditOutcome::Unsupported => {
            "Sorry, only sleeve and colour changes are supported.".to_string()
        }
        EditOutcome::ColorEdited { candidate } => {
            format!("Colour edit saved to {}", candidate.image_path.display())
        }
        EditOutcome::ColorFailed => "Colour edit failed: no image was produced.".to_string(),
        EditOutcome::SleeveEdited { selected, scored } => format!(
            "Sleeve edit saved to {} (score {:.1}, best of {} scored)",
            selected.candidate.image_path.display(),
            selected.score.unwrap_or_default(),
            scored.iter().filter(|entry| entry.score.is_some()).count()
        ),
        EditOutcome::NoSuitableCandidate { produced, .. } => format!(
            "Sleeve edit failed: no suitable candidate ({produced} of {SLEEVE_VARIANT_COUNT} images produced)."
        ),
    }
}

fn report_outcome(outcome: &EditOutcome) {
    println!("{}", outcome_message(outcome));
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use tailor_contracts::runs::candidates::{Candidate, ScoredCandidate};
    use tailor_engine::EditOutcome;

    use super::{outcome_exit_code, outcome_message, Cli, Command, EXIT_EDIT_FAILED};

    fn candidate(ordinal: u32) -> Candidate {
        Candidate {
            image_path: PathBuf::from(format!("edited_image_sleeve_{ordinal}.png")),
            mime_type: "image/png".to_string(),
            generation_prompt: "Make the sleeves full length".to_string(),
            ordinal,
            tag: format!("sleeve_{ordinal}"),
        }
    }

    #[test]
    fn edit_defaults_match_the_stock_session() {
        let cli = Cli::try_parse_from(["tailor-rs", "edit", "--prompt", "make sleeves full"])
            .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit command");
        };
        assert_eq!(args.prompt, "make sleeves full");
        assert_eq!(args.session.source, PathBuf::from("frockonly.png"));
        assert_eq!(args.session.text_model, "openai/gpt-3.5-turbo-0613");
        assert_eq!(
            args.session.image_model,
            "gemini-2.0-flash-exp-image-generation"
        );
        assert_eq!(args.session.events, None);
    }

    #[test]
    fn score_requires_candidate() {
        assert!(Cli::try_parse_from(["tailor-rs", "score"]).is_err());
        let cli = Cli::try_parse_from([
            "tailor-rs",
            "score",
            "--candidate",
            "out/edited_image_sleeve_1.png",
            "--judge-model",
            "dryrun-judge-1",
        ])
        .unwrap();
        let Command::Score(args) = cli.command else {
            panic!("expected score command");
        };
        assert_eq!(args.session.judge_model, "dryrun-judge-1");
    }

    #[test]
    fn failure_outcomes_exit_nonzero() {
        assert_eq!(outcome_exit_code(&EditOutcome::Unsupported), 0);
        assert_eq!(outcome_exit_code(&EditOutcome::ColorFailed), EXIT_EDIT_FAILED);
        let none = EditOutcome::NoSuitableCandidate {
            produced: 1,
            scored: Vec::new(),
        };
        assert_eq!(outcome_exit_code(&none), EXIT_EDIT_FAILED);
        assert!(outcome_message(&none).contains("1 of 3"));
    }

    #[test]
    fn sleeve_message_names_selected_file() {
        let selected = ScoredCandidate {
            candidate: candidate(2),
            score: Some(95.0),
        };
        let outcome = EditOutcome::SleeveEdited {
            selected: selected.clone(),
            scored: vec![
                ScoredCandidate {
                    candidate: candidate(1),
                    score: Some(70.0),
                },
                selected,
                ScoredCandidate {
                    candidate: candidate(3),
                    score: None,
                },
            ],
        };
        assert_eq!(outcome_exit_code(&outcome), 0);
        assert_eq!(
            outcome_message(&outcome),
            "Sleeve edit saved to edited_image_sleeve_2.png (score 95.0, best of 2 scored)"
        );
    }
}
