//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────┐
//! │  ⏱ Telemetry Lab   ● RUNNING   #1206  20 Hz  │
//! ├────────────────────┬─────────────────────────┤
//! │  Latency   12 ms   │  ╭ latency (ms)         │
//! │  Average   11.4 ms │  │ ~~~~~~~~~~~~~~~~~~~~ │
//! │  Jank      2.1 %   │  │ - - - - 16 ms - - -  │
//! │  Frames    1206    │  ╰──────────────────────│
//! │  [load ███░░ 3/5]  │                         │
//! │  [jank █░░░░ 2%]   │                         │
//! ├────────────────────┴─────────────────────────┤
//! │  space: start/stop   +/-: load   1-5   q     │
//! └──────────────────────────────────────────────┘

use super::app::{App, history_points, jank_color, latency_bounds};
use ratatui::{prelude::*, widgets::*};
use telemetrylab_core::ComputeLoad;

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(12),   // main
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_main(f, rows[1], app);
    draw_keys(f, rows[2]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let s = app.snapshot();
    let (state, state_style) = if s.is_running {
        ("● RUNNING", Style::default().bold().fg(Color::Green))
    } else {
        ("○ IDLE", Style::default().fg(Color::DarkGray))
    };
    let elapsed = app
        .run_elapsed()
        .map(|d| format!("  {:.0}s", d.as_secs_f64()))
        .unwrap_or_default();

    let mut spans = vec![
        Span::styled(" ⏱ Telemetry Lab ", Style::default().bold().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(state, state_style),
        Span::styled(
            format!("  #{}  {} Hz{elapsed} ", s.frame_counter, app.target_hz()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if s.is_power_save_mode {
        spans.push(Span::styled(
            " POWER-SAVE ",
            Style::default().bold().bg(Color::Yellow).fg(Color::Black),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(spans));

    f.render_widget(block, area);
}

fn draw_main(f: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(7),    // stats
            Constraint::Length(3), // load gauge
            Constraint::Length(3), // jank gauge
        ])
        .split(cols[0]);

    draw_stats(f, left[0], app);
    draw_load_gauge(f, left[1], app);
    draw_jank_gauge(f, left[2], app);
    draw_chart(f, cols[1], app);
}

fn draw_stats(f: &mut Frame, area: Rect, app: &App) {
    let s = app.snapshot();
    let threshold = app.jank_threshold_ms();

    let latency_style = if s.current_latency_ms > threshold {
        Style::default().fg(Color::Red).bold()
    } else {
        Style::default().fg(Color::Green)
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Latency  ", Style::default().bold()),
            Span::styled(format!("{} ms", s.current_latency_ms), latency_style),
        ]),
        Line::from(vec![
            Span::styled("Average  ", Style::default().bold()),
            Span::raw(format!("{:.2} ms", s.average_latency_ms)),
        ]),
        Line::from(vec![
            Span::styled("Jank     ", Style::default().bold()),
            Span::styled(
                format!("{:.1}% ({} frames)", s.jank_percentage, s.jank_frame_count),
                Style::default().fg(jank_color(s.jank_percentage)),
            ),
        ]),
        Line::from(vec![
            Span::styled("Frames   ", Style::default().bold()),
            Span::raw(s.frame_counter.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Power    ", Style::default().bold()),
            Span::raw(app.power_signal_name()),
        ]),
    ];

    if let Some(err) = app.last_error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            err.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    let block = Block::default().borders(Borders::ALL).title(" Metrics ");
    let p = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    f.render_widget(p, area);
}

fn draw_load_gauge(f: &mut Frame, area: Rect, app: &App) {
    let s = app.snapshot();
    let load = s.compute_load.get();
    let effective = app.effective_load().get();

    let label = if effective != load {
        format!("{load}/{} (running {effective})", ComputeLoad::MAX)
    } else {
        format!("{load}/{}", ComputeLoad::MAX)
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Load "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(f64::from(load) / f64::from(ComputeLoad::MAX))
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_jank_gauge(f: &mut Frame, area: Rect, app: &App) {
    let pct = app.snapshot().jank_percentage;
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Jank "))
        .gauge_style(Style::default().fg(jank_color(pct)))
        .ratio((pct / 100.0).clamp(0.0, 1.0))
        .label(format!("{pct:.1}%"));
    f.render_widget(gauge, area);
}

fn draw_chart(f: &mut Frame, area: Rect, app: &App) {
    let s = app.snapshot();
    let history = &s.latency_history;

    if history.is_empty() {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Latency (ms) ");
        let p = Paragraph::new("Press space to start the pacer")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let threshold = app.jank_threshold_ms();
    let data = history_points(history);
    let x_max = (history.len() as f64 - 1.0).max(10.0);
    let threshold_line = [(0.0, threshold as f64), (x_max, threshold as f64)];
    let (y_min, y_max) = latency_bounds(history, threshold);

    let datasets = vec![
        Dataset::default()
            .name(format!("{} ms", s.current_latency_ms))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&data),
        Dataset::default()
            .name(format!("jank > {threshold} ms"))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&threshold_line),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Latency (ms), last {} cycles ",
            history.len()
        )))
        .x_axis(Axis::default().bounds([0.0, x_max]).labels(vec![
            Line::from("oldest"),
            Line::from("now"),
        ]))
        .y_axis(Axis::default().bounds([y_min, y_max]).labels(vec![
            Line::from(format!("{y_min:.0}")),
            Line::from(format!("{:.0}", y_max / 2.0)),
            Line::from(format!("{y_max:.0}")),
        ]));

    f.render_widget(chart, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(" space: start/stop   +/-: load   1-5: set load   q: quit")
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
