use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, InputMode, ViewMode};
use crate::commands::{format_days, format_due, format_time_left};
use crate::urgency::compute_urgency_at;

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Table
            Constraint::Length(1), // Status
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    let header_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let highlight_style = Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray);

    match app.view_mode {
        ViewMode::Tasks => {
            let now = Local::now().fixed_offset();
            let rows: Vec<Row> = app
                .tasks
                .iter()
                .map(|t| {
                    let urgency = compute_urgency_at(t, now);
                    let (time_left, _) = format_time_left(t);
                    let style = if !t.is_open() {
                        Style::default().fg(Color::DarkGray)
                    } else if urgency > 50.0 {
                        Style::default().fg(Color::Red)
                    } else if urgency > 20.0 {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default().fg(Color::Green)
                    };
                    let status = if t.archived {
                        "Archived"
                    } else if t.completed {
                        "Done"
                    } else {
                        "Pending"
                    };
                    Row::new(vec![
                        Cell::from(t.id.to_string()),
                        Cell::from(t.title.clone()),
                        Cell::from(format!("{}/{}", t.project_id, t.section_id)),
                        Cell::from(format_due(t.due_datetime)),
                        Cell::from(time_left),
                        Cell::from(t.recurrence_label().unwrap_or_default()),
                        Cell::from(t.snooze_count.to_string()),
                        Cell::from(format!("{:.1}", urgency)),
                        Cell::from(status),
                    ])
                    .style(style)
                })
                .collect();

            let widths = [
                Constraint::Length(4),
                Constraint::Min(20),
                Constraint::Length(8),
                Constraint::Length(17),
                Constraint::Length(12),
                Constraint::Length(22),
                Constraint::Length(4),
                Constraint::Length(6),
                Constraint::Length(9),
            ];

            let table = Table::new(rows, widths)
                .header(
                    Row::new(vec!["ID", "Title", "Proj/Sec", "Due", "Time Left", "Repeats", "Snz", "Urg", "Status"])
                        .style(header_style)
                        .bottom_margin(1),
                )
                .block(Block::default().borders(Borders::ALL).title("taskcadence - Tasks"))
                .row_highlight_style(highlight_style)
                .highlight_symbol(">> ");

            f.render_stateful_widget(table, chunks[0], &mut app.state);
        }
        ViewMode::Templates => {
            let rows: Vec<Row> = app
                .templates
                .iter()
                .map(|t| {
                    let style = if t.is_active {
                        Style::default()
                    } else {
                        Style::default().fg(Color::DarkGray)
                    };
                    Row::new(vec![
                        Cell::from(t.id.to_string()),
                        Cell::from(t.title.clone()),
                        Cell::from(t.pattern.to_string()),
                        Cell::from(format_days(t.days_of_week.as_deref())),
                        Cell::from(t.time_of_day.format("%H:%M").to_string()),
                        Cell::from(
                            t.last_generated_date
                                .map(|d| d.to_string())
                                .unwrap_or_else(|| "-".into()),
                        ),
                        Cell::from(if t.is_active { "Active" } else { "Paused" }),
                    ])
                    .style(style)
                })
                .collect();

            let widths = [
                Constraint::Length(4),
                Constraint::Min(20),
                Constraint::Length(15),
                Constraint::Length(28),
                Constraint::Length(6),
                Constraint::Length(11),
                Constraint::Length(7),
            ];

            let table = Table::new(rows, widths)
                .header(
                    Row::new(vec!["ID", "Title", "Pattern", "Days", "At", "Last", "State"])
                        .style(header_style)
                        .bottom_margin(1),
                )
                .block(Block::default().borders(Borders::ALL).title("taskcadence - Templates"))
                .row_highlight_style(highlight_style)
                .highlight_symbol(">> ");

            f.render_stateful_widget(table, chunks[0], &mut app.template_state);
        }
    }

    let status = Paragraph::new(app.status.as_deref().unwrap_or(""))
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(status, chunks[1]);

    let help_text = match (&app.input_mode, &app.view_mode) {
        (InputMode::Renaming, _) => "Enter: Save | Esc: Cancel",
        (InputMode::Normal, ViewMode::Tasks) => {
            "q: Quit | Space: Done | s: Snooze | a: Archive | r: Rename | d: Del | c: Toggle Done | v: View Templates"
        }
        (InputMode::Normal, ViewMode::Templates) => {
            "q: Quit | p: Pause/Resume | g: Generate Today | d: Del | v: View Tasks"
        }
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[2]);

    if app.input_mode == InputMode::Renaming {
        let area = centered_rect(60, 3, f.area());
        f.render_widget(Clear, area);
        let input = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title("Rename Task"));
        f.render_widget(input, area);
    }
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(height),
            Constraint::Length(margin),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
