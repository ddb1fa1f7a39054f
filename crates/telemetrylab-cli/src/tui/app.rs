//! TUI application state and event loop.
//!
//! The pacer already runs on its own thread, so the UI only drains the latest
//! snapshot from its subscription once per frame and forwards key presses to
//! the pacer's controls.

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use telemetrylab_core::{ComputeLoad, FramePacer, PerformanceSnapshot, Subscription};

/// Redraw interval; also bounds key latency.
const UI_TICK: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Chart helpers
// ---------------------------------------------------------------------------

/// Y-axis bounds for the latency chart: always shows the jank threshold with
/// some headroom above the slowest cycle.
pub fn latency_bounds(history: &[u64], jank_threshold_ms: u64) -> (f64, f64) {
    let max = history.iter().copied().max().unwrap_or(0).max(jank_threshold_ms);
    (0.0, (max as f64 * 1.2).max(1.0))
}

/// Chart points, oldest sample at x = 0.
pub fn history_points(history: &[u64]) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v as f64))
        .collect()
}

/// Traffic-light colour for a jank percentage.
pub fn jank_color(pct: f64) -> Color {
    if pct < 5.0 {
        Color::Green
    } else if pct < 20.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pacer: FramePacer,
    sub: Subscription,
    snapshot: PerformanceSnapshot,
    running: bool,
    run_since: Option<Instant>,
    /// Last start error to surface in the TUI.
    last_error: Option<String>,
}

impl App {
    pub fn new(pacer: FramePacer) -> Self {
        let mut sub = pacer.subscribe();
        let snapshot = sub.latest();
        Self {
            pacer,
            sub,
            snapshot,
            running: true,
            run_since: None,
            last_error: None,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        // Always restore terminal, even if the loop returned an error.
        let _ = std::panic::take_hook(); // remove our hook
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        self.pacer.stop();
        let s = self.pacer.snapshot();
        if s.frame_counter > 0 {
            println!(
                "Last run: {} frames, avg {:.2} ms, jank {:.1}%",
                s.frame_counter, s.average_latency_ms, s.jank_percentage
            );
        }

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            self.refresh();
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(UI_TICK)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }

        Ok(())
    }

    /// Pull the newest snapshot, if any.
    pub fn refresh(&mut self) {
        if self.sub.has_changed() {
            self.snapshot = self.sub.latest();
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_run(),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
                self.nudge_load(1);
            }
            KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Down => {
                self.nudge_load(-1);
            }
            KeyCode::Char(c @ '1'..='5') => {
                self.pacer.set_compute_load(i64::from(c as u8 - b'0'));
            }
            _ => {}
        }
        self.refresh();
    }

    fn toggle_run(&mut self) {
        if self.pacer.is_running() {
            self.pacer.stop();
            self.run_since = None;
        } else {
            match self.pacer.start() {
                Ok(()) => {
                    self.last_error = None;
                    self.run_since = Some(Instant::now());
                }
                Err(e) => self.last_error = Some(format!("start failed: {e}")),
            }
        }
    }

    fn nudge_load(&self, delta: i64) {
        let current = i64::from(self.pacer.compute_load().get());
        self.pacer.set_compute_load(current + delta);
    }

    /// Start without a key press (`--autostart`).
    pub fn autostart(&mut self) {
        if !self.pacer.is_running() {
            self.toggle_run();
        }
    }

    pub fn snapshot(&self) -> &PerformanceSnapshot {
        &self.snapshot
    }

    pub fn is_quitting(&self) -> bool {
        !self.running
    }

    pub fn jank_threshold_ms(&self) -> u64 {
        self.pacer.config().jank_threshold_ms
    }

    /// Target rate for the current power-save state.
    pub fn target_hz(&self) -> u32 {
        let config = self.pacer.config();
        if self.snapshot.is_power_save_mode {
            config.power_save_rate_hz
        } else {
            config.normal_rate_hz
        }
    }

    /// Load the loop is actually running right now.
    pub fn effective_load(&self) -> ComputeLoad {
        telemetrylab_core::effective_load(
            self.snapshot.compute_load,
            self.snapshot.is_power_save_mode,
        )
    }

    pub fn power_signal_name(&self) -> &'static str {
        self.pacer.power_signal_name()
    }

    pub fn run_elapsed(&self) -> Option<Duration> {
        self.run_since.map(|t| t.elapsed())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use telemetrylab_core::{ManualPowerSignal, NoopKeeper, PacerConfig, Workload};

    struct IdleWorkload;

    impl Workload for IdleWorkload {
        fn run(&self, _intensity: ComputeLoad) {}
    }

    fn app(power_save: bool) -> App {
        let pacer = FramePacer::with_config(
            PacerConfig {
                normal_rate_hz: 200,
                publish_every: 1,
                ..Default::default()
            },
            Arc::new(ManualPowerSignal::new(power_save)),
            Arc::new(NoopKeeper),
        )
        .with_workload(Arc::new(IdleWorkload));
        App::new(pacer)
    }

    #[test]
    fn latency_bounds_include_threshold() {
        assert_eq!(latency_bounds(&[], 16), (0.0, 16.0 * 1.2));
        assert_eq!(latency_bounds(&[3, 4], 16), (0.0, 16.0 * 1.2));
        assert_eq!(latency_bounds(&[3, 50], 16), (0.0, 50.0 * 1.2));
        assert_eq!(latency_bounds(&[], 0), (0.0, 1.0));
    }

    #[test]
    fn history_points_are_indexed() {
        assert_eq!(history_points(&[5, 7]), vec![(0.0, 5.0), (1.0, 7.0)]);
        assert!(history_points(&[]).is_empty());
    }

    #[test]
    fn jank_color_thresholds() {
        assert_eq!(jank_color(0.0), Color::Green);
        assert_eq!(jank_color(10.0), Color::Yellow);
        assert_eq!(jank_color(50.0), Color::Red);
    }

    #[test]
    fn load_keys_adjust_and_clamp() {
        let mut a = app(false);
        assert_eq!(a.snapshot().compute_load.get(), 2);
        a.handle_key(KeyCode::Char('+'));
        assert_eq!(a.snapshot().compute_load.get(), 3);
        a.handle_key(KeyCode::Char('5'));
        a.handle_key(KeyCode::Char('+'));
        assert_eq!(a.snapshot().compute_load.get(), 5);
        a.handle_key(KeyCode::Char('1'));
        a.handle_key(KeyCode::Char('-'));
        assert_eq!(a.snapshot().compute_load.get(), 1);
    }

    #[test]
    fn space_toggles_run() {
        let mut a = app(false);
        a.handle_key(KeyCode::Char(' '));
        assert!(a.snapshot().is_running);
        assert!(a.run_elapsed().is_some());
        a.handle_key(KeyCode::Char(' '));
        assert!(!a.snapshot().is_running);
        assert!(a.run_elapsed().is_none());
    }

    #[test]
    fn quit_key_ends_loop() {
        let mut a = app(false);
        a.handle_key(KeyCode::Char('q'));
        assert!(a.is_quitting());
    }

    #[test]
    fn target_rate_and_load_follow_power_save() {
        let mut a = app(true);
        a.handle_key(KeyCode::Char('3'));
        a.autostart();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !a.snapshot().is_power_save_mode && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            a.refresh();
        }
        assert!(a.snapshot().is_power_save_mode);
        assert_eq!(a.target_hz(), 10);
        assert_eq!(a.effective_load().get(), 2);
        a.handle_key(KeyCode::Esc);
    }
}
