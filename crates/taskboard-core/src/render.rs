use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::board::{BoardView, EditState};
use crate::config::Config;
use crate::datetime::Calendar;
use crate::filter::Tab;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true) && io::stdout().is_terminal();
        Self { color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn print_board(&self, view: &BoardView, calendar: &Calendar) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_board(&mut out, view, calendar)
    }

    pub fn write_board<W: Write>(
        &self,
        mut out: W,
        view: &BoardView,
        calendar: &Calendar,
    ) -> anyhow::Result<()> {
        let tabs = Tab::ALL
            .iter()
            .map(|tab| {
                let label = format!("{} ({})", tab.label(), view.counts.for_tab(*tab));
                if *tab == view.tab {
                    self.paint(&format!("[{label}]"), "1")
                } else {
                    format!(" {label} ")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{tabs}")?;
        writeln!(out)?;

        if view.rows.is_empty() {
            writeln!(out, "No {} tasks.", view.tab)?;
        } else {
            self.write_tasks(&mut out, &view.rows, &view.edit, calendar)?;
        }

        writeln!(out)?;
        match &view.completed {
            Some(rows) => {
                writeln!(out, "Completed ({}) [open]", view.counts.completed)?;
                if rows.is_empty() {
                    writeln!(out, "Nothing completed yet.")?;
                } else {
                    self.write_tasks(&mut out, rows, &view.edit, calendar)?;
                }
            }
            None => writeln!(out, "Completed ({}) [closed]", view.counts.completed)?,
        }

        if !view.input.is_empty() {
            writeln!(out)?;
            writeln!(out, "New task: {}", view.input)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_tasks(&self, tasks: &[Task], calendar: &Calendar) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        self.write_tasks(&mut out, tasks, &EditState::Idle, calendar)
    }

    pub fn print_task_info(&self, task: &Task, calendar: &Calendar) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id         {}", task.id)?;
        writeln!(out, "text       {}", task.text)?;
        writeln!(out, "completed  {}", task.completed)?;
        writeln!(out, "created    {}", task.created_at.to_rfc3339())?;
        writeln!(out, "day        {}", calendar.format_day(task.created_at))?;
        if task.deleted {
            writeln!(out, "deleted    true")?;
        }
        for (key, value) in &task.extra {
            writeln!(out, "{key:<10} {value}")?;
        }

        Ok(())
    }

    fn write_tasks<W: Write>(
        &self,
        out: W,
        tasks: &[Task],
        edit: &EditState,
        calendar: &Calendar,
    ) -> anyhow::Result<()> {
        let headers = vec![
            " ".to_string(),
            "ID".to_string(),
            "Created".to_string(),
            "Text".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let check = if task.completed { "x" } else { " " };
                let text = match edit {
                    EditState::Editing { id, draft } if *id == task.id => {
                        self.paint(&format!("{draft}_"), "4")
                    }
                    _ if task.completed => self.paint(&task.text, "2"),
                    _ => task.text.clone(),
                };
                vec![
                    format!("[{check}]"),
                    self.paint(&task.id.to_string(), "33"),
                    calendar.format_day(task.created_at),
                    text,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
