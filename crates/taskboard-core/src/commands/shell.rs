use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::board::TaskBoard;
use crate::datetime::Clock;
use crate::filter::Tab;
use crate::render::Renderer;
use crate::storage::TaskStorage;

const HELP: &str = "\
commands:
  add <text>       add a task
  type <text>      set the new-task input
  submit           add the input as a task
  edit <id>        start editing a task
  draft <text>     replace the draft of the task being edited
  save             save the draft
  cancel           stop editing without saving
  toggle <id>      complete or reopen a task
  delete <id>      delete a task
  clear            delete all completed tasks
  tab <name>       switch to the today or overdue tab
  panel            open or close the completed panel
  show             redraw the board
  help             this text
  quit             leave the shell";

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Type(String),
    Submit,
    Edit(u64),
    Draft(String),
    Save,
    Cancel,
    Toggle(u64),
    Delete(u64),
    Clear,
    Tab(Tab),
    Panel,
    Show,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((line, ""));

        let command = match word.to_ascii_lowercase().as_str() {
            "add" | "a" => ShellCommand::Add(rest.to_string()),
            "type" => ShellCommand::Type(rest.to_string()),
            "submit" => ShellCommand::Submit,
            "edit" | "e" => ShellCommand::Edit(parse_id(rest)?),
            "draft" => ShellCommand::Draft(rest.to_string()),
            "save" => ShellCommand::Save,
            "cancel" => ShellCommand::Cancel,
            "toggle" | "done" | "t" => ShellCommand::Toggle(parse_id(rest)?),
            "delete" | "rm" => ShellCommand::Delete(parse_id(rest)?),
            "clear" => ShellCommand::Clear,
            "tab" => ShellCommand::Tab(rest.parse()?),
            "today" => ShellCommand::Tab(Tab::Today),
            "overdue" => ShellCommand::Tab(Tab::Overdue),
            "panel" | "completed" => ShellCommand::Panel,
            "show" | "ls" | "" => ShellCommand::Show,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => return Err(anyhow!("unknown command: {other} (try help)")),
        };
        Ok(command)
    }
}

fn parse_id(raw: &str) -> anyhow::Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("expected a task id, got {raw:?}"))
}

/// Drives one board from line-oriented input until `quit` or end of input.
/// Each line is handled to completion before the next is read.
#[tracing::instrument(skip_all)]
pub fn run_shell<S, C, R, W>(
    board: &mut TaskBoard<S, C>,
    renderer: &Renderer,
    input: R,
    mut out: W,
) -> anyhow::Result<()>
where
    S: TaskStorage,
    C: Clock,
    R: BufRead,
    W: Write,
{
    info!("starting shell");
    renderer.write_board(&mut out, &board.view(), board.calendar())?;

    for line in input.lines() {
        let line = line.context("failed reading shell input")?;
        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(err) => {
                writeln!(out, "{err:#}")?;
                continue;
            }
        };
        debug!(?command, "shell command");

        if command == ShellCommand::Quit {
            break;
        }
        if command == ShellCommand::Help {
            writeln!(out, "{HELP}")?;
            continue;
        }

        if let Some(notice) = apply(board, command)? {
            writeln!(out, "{notice}")?;
        }
        writeln!(out)?;
        renderer.write_board(&mut out, &board.view(), board.calendar())?;
    }

    out.flush()?;
    info!("shell finished");
    Ok(())
}

/// Applies a command and returns a notice when nothing happened.
fn apply<S: TaskStorage, C: Clock>(
    board: &mut TaskBoard<S, C>,
    command: ShellCommand,
) -> anyhow::Result<Option<String>> {
    let notice = match command {
        ShellCommand::Add(text) => board
            .add(&text)?
            .is_none()
            .then(|| "Nothing to add.".to_string()),
        ShellCommand::Type(text) => {
            board.set_input(text);
            None
        }
        ShellCommand::Submit => board
            .submit_input()?
            .is_none()
            .then(|| "Nothing to add.".to_string()),
        ShellCommand::Edit(id) => (!board.begin_edit(id)).then(|| format!("No task {id}.")),
        ShellCommand::Draft(text) => {
            (!board.update_draft(text)).then(|| "Not editing anything.".to_string())
        }
        ShellCommand::Save => (!board.save_edit()?).then(|| "Nothing saved.".to_string()),
        ShellCommand::Cancel => {
            board.cancel_edit();
            None
        }
        ShellCommand::Toggle(id) => {
            (!board.toggle_completed(id)?).then(|| format!("No task {id}."))
        }
        ShellCommand::Delete(id) => (!board.remove(id)?).then(|| format!("No task {id}.")),
        ShellCommand::Clear => {
            let cleared = board.clear_completed()?;
            Some(format!("Cleared {cleared} completed task(s)."))
        }
        ShellCommand::Tab(tab) => {
            board.select_tab(tab);
            None
        }
        ShellCommand::Panel => {
            board.toggle_completed_panel();
            None
        }
        ShellCommand::Show | ShellCommand::Help | ShellCommand::Quit => None,
    };
    Ok(notice)
}
