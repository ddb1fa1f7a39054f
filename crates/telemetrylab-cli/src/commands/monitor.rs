use super::PacerArgs;

pub fn run(args: &PacerArgs, autostart: bool) {
    let pacer = super::make_pacer(args);
    let mut app = crate::tui::app::App::new(pacer);
    if autostart {
        app.autostart();
    }
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
