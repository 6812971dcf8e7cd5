//! Interactive chat REPL.

use super::Context;
use crate::render::TerminalRenderer;
use anyhow::Result;
use colored::Colorize;
use daydream_application::{ChatSession, TurnOutcome};
use daydream_core::image::normalize_image_url;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};
use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write;

const COMMANDS: [&str; 5] = ["/image", "/attach", "/clear", "/help", "/quit"];

/// Completion, highlighting and hints for slash commands.
#[derive(Clone, Default)]
struct ReplHelper;

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }

        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: format!("{} ", cmd),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for ReplHelper {}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Quit,
    Clear,
    Help,
    /// `/attach <url>`; an empty argument removes the attachment.
    Attach(&'a str),
    Unknown(&'a str),
    /// Text for the assistant, including `/image` requests.
    Say(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line == "quit" || line == "exit" {
            return Self::Quit;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line);
        };

        let (name, argument) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match name {
            "quit" | "exit" => Self::Quit,
            "clear" => Self::Clear,
            "help" => Self::Help,
            "attach" => Self::Attach(argument.trim()),
            "image" => Self::Say(line),
            _ => Self::Unknown(name),
        }
    }
}

fn print_help() {
    println!("{}", "/image <prompt>   generate an image".bright_black());
    println!(
        "{}",
        "/attach <url>     attach a photo to the next message (no url to remove)".bright_black()
    );
    println!("{}", "/clear            forget this conversation".bright_black());
    println!("{}", "/quit             leave (Ctrl-D works too)".bright_black());
    println!(
        "{}",
        "Ctrl-C while a reply is streaming stops it.".bright_black()
    );
}

pub async fn run(ctx: &Context, no_stream: bool) -> Result<()> {
    let mut config = ctx.config()?;
    if no_stream {
        config.streaming = false;
    }
    let identity = ctx.identity();
    let factory = ctx.factory(config)?;

    println!("{}", "=== Daydream ===".bright_magenta().bold());
    if identity.is_fallback() {
        println!(
            "{}",
            format!(
                "Chatting as the shared identity '{}'. Run `daydream login <id>` to keep your own history.",
                identity.user_id
            )
            .yellow()
        );
    }

    let mut session = factory
        .open_session(&identity.user_id, TerminalRenderer)
        .await;
    for unit in session.conversation().display_units() {
        println!("{}", unit);
    }
    println!(
        "{}",
        format!(
            "Signed in as {} ({} history). Type /help for commands.",
            identity.user_id,
            session.history_backend()
        )
        .bright_black()
    );
    println!();

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ReplHelper));

    loop {
        let prompt = if session.attachment().is_some() { "📎>> " } else { ">> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.trim());

                match ReplCommand::parse(&line) {
                    ReplCommand::Quit => break,
                    ReplCommand::Help => print_help(),
                    ReplCommand::Clear => {
                        let status = session.clear().await;
                        if status.ok {
                            println!("{}", "🧹 Conversation cleared".bright_black());
                        } else {
                            eprintln!("{}", "Conversation cleared, but the history store did not confirm".red());
                        }
                    }
                    ReplCommand::Attach("") => {
                        session.attach(None);
                        println!("{}", "Attachment removed".bright_black());
                    }
                    ReplCommand::Attach(raw) => {
                        match normalize_image_url(raw, factory.config().origin()) {
                            Some(image) => {
                                println!("{}", format!("📎 Attached {}", image).bright_black());
                                session.attach(Some(image));
                            }
                            None => eprintln!("{}", "Not a usable image URL".red()),
                        }
                    }
                    ReplCommand::Unknown(name) => {
                        println!("{}", format!("Unknown command /{}", name).bright_black());
                    }
                    ReplCommand::Say(text) => run_turn(&mut session, text).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    let status = session.shutdown().await;
    if !status.ok {
        eprintln!("{}", "The last history save failed".red());
    }
    println!("{}", "Goodbye!".bright_green());
    Ok(())
}

/// Sends one message, printing the reply as it streams in.
async fn run_turn(session: &mut ChatSession<TerminalRenderer>, text: &str) {
    // Ctrl-C is delivered as a signal while a reply is streaming, since
    // rustyline only owns the terminal during `readline`.
    let interrupter = session.interrupter();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupter.interrupt();
        }
    });

    let mut stdout = std::io::stdout();
    let mut streamed = false;
    let outcome = session
        .send(text, |delta| {
            if !streamed {
                print!("{} ", TerminalRenderer::assistant_label());
                streamed = true;
            }
            print!("{}", delta.bright_blue());
            let _ = stdout.flush();
        })
        .await;
    ctrl_c.abort();

    if streamed {
        println!();
    }
    match outcome {
        TurnOutcome::Completed { .. } | TurnOutcome::Skipped => {}
        TurnOutcome::Cancelled => println!("{}", "(interrupted)".bright_black()),
        TurnOutcome::Failed { .. } => {
            if let Some(notice) = session.conversation().trailing_unit() {
                println!("{}", notice);
            }
        }
        TurnOutcome::Image { .. } => {
            // Acknowledgement followed by the image unit.
            let units = session.conversation().display_units();
            for unit in &units[units.len().saturating_sub(2)..] {
                println!("{}", unit);
            }
        }
    }
}
