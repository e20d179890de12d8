use anyhow::Result;

mod app;
mod bot;
mod config;
mod handler;
mod language;
mod message;
mod speech;
mod tui;
mod ui;

use app::App;
use bot::BotClient;
use config::Config;
use language::Language;
use speech::{CommandEngine, SpeechEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    // The recognition capability is probed once, at startup: a configured
    // recognizer command means voice input is offered, otherwise the toggle
    // reports the capability as absent
    let speech: Option<Box<dyn SpeechEngine>> = config.speech_command.as_deref().map(|cmd| {
        Box::new(CommandEngine::new(cmd, events.speech_sender())) as Box<dyn SpeechEngine>
    });

    let language = config
        .language
        .as_deref()
        .and_then(Language::from_str)
        .unwrap_or(Language::English);

    let client = BotClient::new(config.webhook_url());
    let mut app = App::new(client, speech, language);

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        // Fold completed webhook calls into the conversation; the 300ms tick
        // keeps this running even when the user is idle
        app.poll_pending_sends().await;
    }
    Ok(())
}
