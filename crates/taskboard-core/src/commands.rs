mod shell;

use tracing::{debug, info, instrument};

use crate::board::TaskBoard;
use crate::cli::Command;
use crate::config::Config;
use crate::datetime::Clock;
use crate::filter::{self, Tab};
use crate::render::Renderer;
use crate::storage::TaskStorage;
use crate::store::DeletePolicy;

pub use shell::{ShellCommand, run_shell};

#[instrument(skip(board, cfg, renderer))]
pub fn dispatch<S: TaskStorage, C: Clock>(
    board: &mut TaskBoard<S, C>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Add { text } => cmd_add(board, &text.join(" ")),
        Command::List { tab, completed } => cmd_list(board, renderer, tab, completed),
        Command::Completed => cmd_completed(board, renderer),
        Command::Edit { id, text } => cmd_edit(board, id, &text.join(" ")),
        Command::Toggle { id } => cmd_toggle(board, id),
        Command::Delete { id } => cmd_delete(board, id),
        Command::ClearCompleted => cmd_clear_completed(board),
        Command::Purge => cmd_purge(board),
        Command::Export => cmd_export(board),
        Command::Info { id } => cmd_info(board, renderer, id),
        Command::Show => cmd_show(cfg),
        Command::Shell => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            run_shell(board, renderer, stdin.lock(), stdout.lock())
        }
    }
}

fn cmd_add<S: TaskStorage, C: Clock>(board: &mut TaskBoard<S, C>, text: &str) -> anyhow::Result<()> {
    info!("command add");
    match board.add(text)? {
        Some(id) => println!("Created task {id}."),
        None => println!("Nothing to add."),
    }
    Ok(())
}

fn cmd_list<S: TaskStorage, C: Clock>(
    board: &mut TaskBoard<S, C>,
    renderer: &Renderer,
    tab: Option<Tab>,
    completed: bool,
) -> anyhow::Result<()> {
    if let Some(tab) = tab {
        board.select_tab(tab);
    }
    board.set_completed_panel(completed);
    renderer.print_board(&board.view(), board.calendar())
}

fn cmd_completed<S: TaskStorage, C: Clock>(
    board: &TaskBoard<S, C>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    let tasks = board.store().snapshot();
    let rows: Vec<_> = filter::completed(&tasks).into_iter().cloned().collect();
    renderer.print_tasks(&rows, board.calendar())
}

/// One-shot form of the edit flow: open the editor on `id`, set the draft, save.
fn cmd_edit<S: TaskStorage, C: Clock>(
    board: &mut TaskBoard<S, C>,
    id: u64,
    text: &str,
) -> anyhow::Result<()> {
    info!("command edit");
    if !board.begin_edit(id) {
        println!("No task {id}.");
        return Ok(());
    }
    board.update_draft(text);
    if board.save_edit()? {
        println!("Modified task {id}.");
    } else {
        println!("Task {id} unchanged.");
    }
    Ok(())
}

fn cmd_toggle<S: TaskStorage, C: Clock>(board: &mut TaskBoard<S, C>, id: u64) -> anyhow::Result<()> {
    info!("command toggle");
    if !board.toggle_completed(id)? {
        println!("No task {id}.");
        return Ok(());
    }
    let completed = board.store().get(id).is_some_and(|task| task.completed);
    if completed {
        println!("Completed task {id}.");
    } else {
        println!("Reopened task {id}.");
    }
    Ok(())
}

fn cmd_delete<S: TaskStorage, C: Clock>(board: &mut TaskBoard<S, C>, id: u64) -> anyhow::Result<()> {
    info!("command delete");
    if board.remove(id)? {
        println!("Deleted task {id}.");
    } else {
        println!("No task {id}.");
    }
    Ok(())
}

fn cmd_clear_completed<S: TaskStorage, C: Clock>(
    board: &mut TaskBoard<S, C>,
) -> anyhow::Result<()> {
    info!("command clear-completed");
    let cleared = board.clear_completed()?;
    println!("Cleared {cleared} completed task(s).");
    Ok(())
}

fn cmd_purge<S: TaskStorage, C: Clock>(board: &mut TaskBoard<S, C>) -> anyhow::Result<()> {
    info!("command purge");
    if board.store().policy() == DeletePolicy::Hard {
        debug!("hard delete policy, nothing is kept to purge");
    }
    let purged = board.purge_deleted()?;
    println!("Purged {purged} deleted task(s).");
    Ok(())
}

fn cmd_export<S: TaskStorage, C: Clock>(board: &TaskBoard<S, C>) -> anyhow::Result<()> {
    info!("command export");
    let out = serde_json::to_string(board.store().tasks())?;
    println!("{out}");
    Ok(())
}

fn cmd_info<S: TaskStorage, C: Clock>(
    board: &TaskBoard<S, C>,
    renderer: &Renderer,
    id: u64,
) -> anyhow::Result<()> {
    match board.store().get(id) {
        Some(task) => renderer.print_task_info(task, board.calendar()),
        None => {
            println!("No task {id}.");
            Ok(())
        }
    }
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (key, value) in cfg.iter() {
        println!("{key}={value}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}
