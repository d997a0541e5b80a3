//! Console front-end for the notes client.
//!
//! Run with: cargo run -p notes-console
//!
//! Connects to `NOTES_WS_URL` (default `ws://127.0.0.1:8765`) and keeps the
//! signed-in user in `NOTES_SESSION_FILE`.

use std::{
    io::{self, Write as _},
    path::Path,
    sync::Arc,
};

use anyhow::{Context as _, bail};
use notes_client::{
    Alert, AlertKind, AudioCapture, Busy, Controller, Dialog, NoteCard, NoteDraft, NoteEditor,
    Placeholder, View,
    media::{Recording, WavFileCapture, read_file},
    render::render_text,
};
use notes_core::{ClientConfig, NoteType, SessionUser};
use notes_session::storage::FileStorage;
use notes_transport::ConnectionState;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prints everything the controller shows.
struct ConsoleView;

impl View for ConsoleView {
    fn show_notes(&self, cards: &[NoteCard]) {
        println!("\nYour Notes:");
        for (idx, card) in cards.iter().enumerate() {
            println!("{}. [{}] {}", idx + 1, card.id, render_text(card));
        }
    }

    fn show_placeholder(&self, placeholder: Placeholder) {
        println!("{}", placeholder.text());
    }

    fn show_alert(&self, alert: Alert) {
        match alert.kind {
            AlertKind::Success => println!("[ok] {}", alert.message),
            AlertKind::Error => println!("[error] {}", alert.message),
        }
    }

    fn show_connection(&self, state: ConnectionState) {
        match state {
            ConnectionState::Connecting => println!("(connecting...)"),
            ConnectionState::Open => println!("(connected)"),
            ConnectionState::Closed => println!("(disconnected)"),
        }
    }

    fn show_signed_in(&self, user: &SessionUser) {
        println!("Signed in as {} <{}>", user.username, user.email);
    }

    fn show_signed_out(&self) {
        println!("Signed out");
    }

    fn show_profile(&self, user: &SessionUser) {
        let avatar = user.initial().unwrap_or('?');
        println!("\n[{avatar}] {}\nEmail: {}\nRegistered: Just now", user.username, user.email);
    }

    fn show_note_editor(&self, editor: &NoteEditor) {
        println!("\n{}", editor.heading);
        if editor.draft.note_id.is_some() {
            println!("Title: {}\nContent: {}", editor.draft.title, editor.draft.content);
            println!("Attachments: {}", editor.previews.len());
        }
    }

    fn close_dialog(&self, dialog: Dialog) {
        tracing::debug!(?dialog, "dialog closed");
    }

    fn set_busy(&self, busy: Busy) {
        println!("{}", busy.label());
    }

    fn reset_busy(&self) {}
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, label: &str) -> anyhow::Result<String> {
        print!("{label}");
        io::stdout().flush()?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => bail!("input closed"),
        }
    }

    async fn confirm(&mut self, label: &str) -> anyhow::Result<bool> {
        Ok(self.ask(label).await?.eq_ignore_ascii_case("y"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let config = ClientConfig::from_env().context("invalid NOTES_* configuration")?;
    tracing::info!(url = %config.url, "starting notes console");

    let storage = Arc::new(FileStorage::new(&config.session_file));
    let controller = Controller::from_config(&config, storage, Arc::new(ConsoleView));
    let _connection = controller.start().await;

    let mut prompt = Prompt::new();
    loop {
        println!("\n1. Login");
        println!("2. Register");
        println!("3. Create Note");
        println!("4. View Notes");
        println!("5. Search Notes");
        println!("6. Edit Note");
        println!("7. Delete Note");
        println!("8. Delete All Notes");
        println!("9. Profile");
        println!("r. Retry connection");
        println!("l. Logout");
        println!("0. Exit");

        let choice = prompt.ask("Select an option: ").await?;
        let result = match choice.as_str() {
            "1" => login(&controller, &mut prompt).await,
            "2" => register(&controller, &mut prompt).await,
            "3" => create_note(&controller, &mut prompt).await,
            "4" => ignore(controller.load_notes().await),
            "5" => {
                let query = prompt.ask("Search: ").await?;
                ignore(controller.search_notes(&query).await)
            }
            "6" => edit_note(&controller, &mut prompt).await,
            "7" => {
                let id = prompt.ask("Note id: ").await?;
                if prompt
                    .confirm("Are you sure you want to delete this note? (y/n): ")
                    .await?
                {
                    ignore(controller.delete_note(&id).await)
                } else {
                    Ok(())
                }
            }
            "8" => {
                if prompt
                    .confirm(
                        "Are you sure you want to delete ALL your notes? \
                         This action cannot be undone! (y/n): ",
                    )
                    .await?
                {
                    ignore(controller.delete_all_notes().await)
                } else {
                    Ok(())
                }
            }
            "9" => ignore(controller.show_profile()),
            "r" => {
                controller.reconnect_now();
                Ok(())
            }
            "l" => {
                controller.logout().await;
                Ok(())
            }
            "0" => break,
            _ => {
                println!("Invalid option");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("Error: {e:#}");
        }
    }

    controller.stop();
    Ok(())
}

/// Failures were already shown through the view.
fn ignore(result: Result<(), notes_client::ClientError>) -> anyhow::Result<()> {
    if let Err(e) = result {
        tracing::debug!("operation failed: {e}");
    }
    Ok(())
}

async fn login(controller: &Controller, prompt: &mut Prompt) -> anyhow::Result<()> {
    let email = prompt.ask("Email: ").await?;
    let password = prompt.ask("Password: ").await?;
    ignore(controller.login(&email, &password).await)
}

async fn register(controller: &Controller, prompt: &mut Prompt) -> anyhow::Result<()> {
    let username = prompt.ask("Username: ").await?;
    let email = prompt.ask("Email: ").await?;
    let password = prompt.ask("Password: ").await?;
    let confirm = prompt.ask("Confirm password: ").await?;
    ignore(
        controller
            .register(&username, &email, &password, &confirm)
            .await,
    )
}

async fn create_note(controller: &Controller, prompt: &mut Prompt) -> anyhow::Result<()> {
    let Ok(editor) = controller.open_create_note() else {
        return Ok(());
    };
    let mut draft: NoteDraft = editor.draft;
    draft.title = prompt.ask("Note title: ").await?;

    println!("Note types: 1. Text 2. Voice 3. Image");
    draft.note_type = match prompt.ask("Select note type (1-3): ").await?.as_str() {
        "2" => NoteType::Voice,
        "3" => NoteType::Image,
        _ => NoteType::Text,
    };

    match draft.note_type {
        NoteType::Text => draft.content = prompt.ask("Note content: ").await?,
        NoteType::Voice => {
            let source = prompt.ask("WAV file to use as microphone input: ").await?;
            let capture = WavFileCapture::new(source);
            capture.start().await?;
            let recording = Recording::start();
            prompt.ask("Recording... press Enter to stop ").await?;
            draft.audio = Some(capture.stop().await?);
            println!("Recorded {}", recording.elapsed_label());
        }
        NoteType::Image => {
            let paths = prompt.ask("Files to attach (comma separated): ").await?;
            for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let file = read_file(Path::new(path))
                    .await
                    .with_context(|| format!("reading {path}"))?;
                draft.files.push(file);
            }
            if draft.files.is_empty() {
                draft.content = prompt.ask("Note content: ").await?;
            }
        }
    }

    draft.encrypt = prompt.confirm("Encrypt note? (y/n): ").await?;
    ignore(controller.save_note(draft).await)
}

async fn edit_note(controller: &Controller, prompt: &mut Prompt) -> anyhow::Result<()> {
    let id = prompt.ask("Note id: ").await?;
    let Ok(editor) = controller.open_edit_note(&id) else {
        return Ok(());
    };
    let title = prompt.ask("New title (empty keeps current): ").await?;
    let content = prompt.ask("New content (empty keeps current): ").await?;
    let title = if title.is_empty() { editor.draft.title } else { title };
    let content = if content.is_empty() {
        editor.draft.content
    } else {
        content
    };
    ignore(controller.update_note(&id, &title, &content).await)
}
