//! User actions in, view updates out.
//!
//! Requests are fire-and-observe: an operation sends its request and the
//! reply is handled by the push listener like any other inbound message,
//! routed by `(status, action)`. Only transport failures are reported by the
//! operation itself.

use std::sync::{Arc, Mutex, PoisonError};

use notes_core::{
    ClientConfig, ClientId, ClientMessage, Handshake, Note, NoteUpdate, ServerMessage,
    SessionUser, StateStorage,
};
use notes_session::SessionStore;
use notes_transport::{ConnectionState, Transport};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        watch,
    },
    task::{AbortHandle, JoinHandle},
};

use crate::{
    Alert, Busy, ClientError, Dialog, NoteCard, NoteDraft, NoteEditor, Placeholder, PushEvent,
    View, render::visible_notes,
};

/// Drives a [`View`] from the session and the server connection.
#[derive(Clone)]
pub struct Controller {
    transport: Arc<Transport>,
    session: Arc<SessionStore>,
    view: Arc<dyn View>,
    /// Last list shown, for edit lookups.
    notes: Arc<Mutex<Vec<Note>>>,
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
}

impl Controller {
    #[must_use]
    pub fn new(transport: Arc<Transport>, session: Arc<SessionStore>, view: Arc<dyn View>) -> Self {
        Self {
            transport,
            session,
            view,
            notes: Arc::new(Mutex::new(Vec::new())),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wire a session store and transport from configuration.
    #[must_use]
    pub fn from_config(
        config: &ClientConfig,
        storage: Arc<dyn StateStorage>,
        view: Arc<dyn View>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(storage, ClientId::generate()));
        let handshake: Arc<dyn Handshake> = Arc::clone(&session) as Arc<dyn Handshake>;
        let transport = Transport::new(config, handshake);
        Self::new(transport, session, view)
    }

    #[must_use]
    pub const fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Restore any saved session, then start listening and connecting.
    ///
    /// The push listener subscribes before the first connection attempt, so
    /// no inbound message is missed.
    pub async fn start(&self) -> JoinHandle<()> {
        match self.session.restore().await {
            Ok(Some(user)) => self.view.show_signed_in(&user),
            Ok(None) => self.signed_out(Placeholder::LoginPrompt),
            Err(e) => {
                tracing::warn!("could not read saved session: {e}");
                self.signed_out(Placeholder::LoginPrompt);
            }
        }

        let listener = tokio::spawn(self.clone().listen(self.transport.subscribe()));
        let watcher = tokio::spawn(self.clone().watch_connection(self.transport.state()));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([listener.abort_handle(), watcher.abort_handle()]);

        self.transport.connect()
    }

    /// Stop background tasks and close the connection.
    pub fn stop(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
        self.transport.shutdown();
    }

    async fn listen(self, mut rx: broadcast::Receiver<ServerMessage>) {
        loop {
            match rx.recv().await {
                Ok(msg) => self.handle_message(&msg).await,
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "push listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    async fn watch_connection(self, mut state: watch::Receiver<ConnectionState>) {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            self.handle_state(current);
        }
    }

    /// React to a connection state change.
    pub fn handle_state(&self, state: ConnectionState) {
        self.view.show_connection(state);
        match state {
            ConnectionState::Open => {
                if self.session.is_authenticated() {
                    self.spawn_load_notes();
                } else {
                    self.view.show_placeholder(Placeholder::ConnectedLoginPrompt);
                }
            }
            ConnectionState::Closed => self.view.show_placeholder(Placeholder::Reconnecting),
            ConnectionState::Connecting => {}
        }
    }

    /// React to one inbound message.
    pub async fn handle_message(&self, msg: &ServerMessage) {
        match PushEvent::classify(msg) {
            PushEvent::Connected => {
                tracing::debug!("server acknowledged connection");
                if self.session.is_authenticated() {
                    self.spawn_load_notes();
                }
            }
            PushEvent::LoggedIn(Some(user)) => self.signed_in(user).await,
            PushEvent::LoggedIn(None) => {
                self.fail(msg.message.as_deref().or(Some("Login failed")));
            }
            PushEvent::Registered => {
                self.view.reset_busy();
                self.view.close_dialog(Dialog::Register);
                self.view
                    .show_alert(Alert::success("Registration successful. Please login."));
            }
            PushEvent::NotesLoaded(notes) | PushEvent::SearchResults(notes) => {
                self.display_notes(notes);
            }
            PushEvent::NoteCreated => self.note_saved("Note created successfully"),
            PushEvent::NoteUpdated(_) => self.note_saved("Note updated successfully"),
            PushEvent::NoteDeleted => {
                self.view.reset_busy();
                self.spawn_load_notes();
                self.view.show_alert(Alert::success("Note deleted successfully"));
            }
            PushEvent::AllNotesDeleted(message) => {
                self.view.reset_busy();
                self.view.show_alert(Alert::success(
                    message.unwrap_or_else(|| "All notes deleted".to_string()),
                ));
                self.spawn_load_notes();
                self.view.close_dialog(Dialog::Profile);
            }
            PushEvent::Failed(message) => self.fail(message.as_deref()),
            PushEvent::Ignored => {
                tracing::debug!(status = ?msg.status, action = ?msg.action, "unhandled message");
            }
        }
    }

    async fn signed_in(&self, user: SessionUser) {
        self.view.reset_busy();
        if let Err(e) = self.session.login(user.clone()).await {
            tracing::warn!("failed to persist session: {e}");
        }
        self.view.show_signed_in(&user);
        self.view.close_dialog(Dialog::Login);
        self.spawn_load_notes();
        self.view.show_alert(Alert::success("Login successful!"));
    }

    fn signed_out(&self, placeholder: Placeholder) {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.view.show_signed_out();
        self.view.show_placeholder(placeholder);
    }

    fn note_saved(&self, alert: &str) {
        self.view.reset_busy();
        self.view.close_dialog(Dialog::Note);
        if self.session.is_authenticated() {
            self.spawn_load_notes();
        }
        self.view.show_alert(Alert::success(alert));
    }

    fn display_notes(&self, notes: Option<Vec<Note>>) {
        let Some(notes) = notes else {
            self.view.show_placeholder(Placeholder::LoadError);
            return;
        };

        let user = self.session.current();
        let visible: Vec<Note> = visible_notes(&notes, user.as_ref())
            .into_iter()
            .cloned()
            .collect();
        if visible.is_empty() {
            self.view.show_placeholder(Placeholder::NoNotes);
        } else {
            let cards: Vec<NoteCard> = visible.iter().map(NoteCard::from_note).collect();
            self.view.show_notes(&cards);
        }
        *self.notes.lock().unwrap_or_else(PoisonError::into_inner) = visible;
    }

    fn fail(&self, message: Option<&str>) {
        self.view
            .show_alert(Alert::error(message.unwrap_or("An error occurred")));
        self.view.reset_busy();
    }

    fn spawn_load_notes(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.load_notes().await;
        });
    }

    /// Send `message`; its reply is handled by the listener.
    async fn dispatch(&self, message: ClientMessage) -> Result<(), ClientError> {
        match self.transport.try_request(message).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.fail(Some(&e.to_string()));
                Err(e.into())
            }
        }
    }

    fn reject(&self, message: &str) -> ClientError {
        self.view.show_alert(Alert::error(message));
        ClientError::Validation(message.to_string())
    }

    fn require_user(&self, message: &str) -> Result<SessionUser, ClientError> {
        self.session.current().ok_or_else(|| self.reject(message))
    }

    /// # Errors
    /// Returns error if the request could not be delivered.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        self.view.set_busy(Busy::Login);
        self.dispatch(ClientMessage::Login {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// # Errors
    /// Returns `Validation` if the passwords differ, or error if the request
    /// could not be delivered.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), ClientError> {
        if password != confirm_password {
            return Err(self.reject("Passwords do not match"));
        }
        self.view.set_busy(Busy::Register);
        self.dispatch(ClientMessage::Register {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// Sign out immediately.
    ///
    /// The server is told in the background when the connection is open; the
    /// local session is cleared without waiting for it.
    pub async fn logout(&self) {
        let user = self.session.current().filter(|_| self.transport.is_open());
        if let Some(user) = user {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                if let Err(e) = transport
                    .try_request(ClientMessage::Logout { user_id: user.id })
                    .await
                {
                    tracing::debug!("logout notification not delivered: {e}");
                }
            });
        }

        self.session.logout().await;
        self.signed_out(Placeholder::LoggedOut);
        self.view.show_alert(Alert::success("Logged out successfully"));
    }

    /// Request the signed-in user's notes.
    ///
    /// # Errors
    /// Returns error if the request could not be delivered.
    pub async fn load_notes(&self) -> Result<(), ClientError> {
        let Some(user) = self.session.current() else {
            self.view.show_placeholder(Placeholder::LoginPrompt);
            return Ok(());
        };
        self.view.show_placeholder(Placeholder::Loading);
        self.dispatch(ClientMessage::GetNotes { user_id: user.id }).await
    }

    /// Search notes; an empty query reloads the full list.
    ///
    /// # Errors
    /// Returns `Validation` when signed out, or error if the request could not
    /// be delivered.
    pub async fn search_notes(&self, query: &str) -> Result<(), ClientError> {
        let user = self.require_user("Please login to search notes")?;
        let query = query.trim();
        if query.is_empty() {
            return self.load_notes().await;
        }
        self.view.show_placeholder(Placeholder::Searching);
        self.dispatch(ClientMessage::SearchNotes {
            user_id: user.id,
            query: query.to_string(),
        })
        .await
    }

    /// # Errors
    /// Returns `Validation` when signed out.
    pub fn open_create_note(&self) -> Result<NoteEditor, ClientError> {
        self.require_user("You need to login first")?;
        let editor = NoteEditor::blank();
        self.view.show_note_editor(&editor);
        Ok(editor)
    }

    /// Open the editor for a note from the last displayed list.
    ///
    /// # Errors
    /// Returns `Validation` when signed out or the note is not listed.
    pub fn open_edit_note(&self, note_id: &str) -> Result<NoteEditor, ClientError> {
        self.require_user("You need to login first")?;
        let note = self
            .notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|n| n.id == note_id)
            .cloned()
            .ok_or_else(|| self.reject("Note not found"))?;
        let editor = NoteEditor::from_note(&note);
        self.view.show_note_editor(&editor);
        Ok(editor)
    }

    /// Create or update a note from the form.
    ///
    /// # Errors
    /// Returns `Validation` when signed out, or error if the request could not
    /// be delivered.
    pub async fn save_note(&self, draft: NoteDraft) -> Result<(), ClientError> {
        let user = self.require_user("You need to login first")?;
        self.view.set_busy(Busy::SaveNote);
        self.dispatch(draft.into_message(&user.id)).await
    }

    /// Change only the title and content of a note.
    ///
    /// # Errors
    /// Returns `Validation` when signed out, or error if the request could not
    /// be delivered.
    pub async fn update_note(
        &self,
        note_id: &str,
        title: &str,
        content: &str,
    ) -> Result<(), ClientError> {
        let user = self.require_user("You need to login first")?;
        self.dispatch(ClientMessage::UpdateNote {
            user_id: user.id,
            note_id: note_id.to_string(),
            update_data: NoteUpdate {
                title: Some(title.to_string()),
                content: Some(content.to_string()),
                ..NoteUpdate::default()
            },
        })
        .await
    }

    /// # Errors
    /// Returns `Validation` when signed out, or error if the request could not
    /// be delivered.
    pub async fn delete_note(&self, note_id: &str) -> Result<(), ClientError> {
        let user = self.require_user("You need to login to delete notes")?;
        self.view.set_busy(Busy::DeleteNote);
        self.dispatch(ClientMessage::DeleteNote {
            user_id: user.id,
            note_id: note_id.to_string(),
        })
        .await
    }

    /// # Errors
    /// Returns `Validation` when signed out, or error if the request could not
    /// be delivered.
    pub async fn delete_all_notes(&self) -> Result<(), ClientError> {
        let user = self.require_user("You need to login to delete notes")?;
        self.view.set_busy(Busy::DeleteAll);
        self.dispatch(ClientMessage::DeleteAllNotes { user_id: user.id })
            .await
    }

    /// # Errors
    /// Returns `Validation` when signed out.
    pub fn show_profile(&self) -> Result<(), ClientError> {
        let user = self.require_user("Please login to view profile")?;
        self.view.show_profile(&user);
        Ok(())
    }

    /// Skip the remaining reconnect wait.
    pub fn reconnect_now(&self) {
        self.transport.reconnect_now();
    }
}
