//! Runs a [`FeedController`] on a tokio task.
//!
//! The task owns the controller. Callers talk to it through a [`FeedHandle`];
//! fetches run on their own tasks and report back over a channel, so a slow
//! request never blocks keystrokes or other commands. Every state change is
//! published as a fresh [`FeedView`] on a watch channel.

use crate::api::PostSource;
use crate::controller::{FeedConfig, FeedController, FeedView, FetchCommand, Ticket};
use crate::error::{DeleteError, FeedError, FetchFailure, ValidationError};
use bloggy_core::{PostPage, Scope};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

const COMMAND_BUFFER: usize = 32;

enum Command {
    SearchEdited(String),
    ScopeSelected(Scope, oneshot::Sender<Result<(), ValidationError>>),
    UserChanged(Option<String>),
    LoadMoreVisible,
    PageSelected(u32, oneshot::Sender<Result<(), ValidationError>>),
    Refresh,
    DeletePost(String, oneshot::Sender<Result<bool, DeleteError>>),
}

enum Completion {
    Page {
        ticket: Ticket,
        result: Result<PostPage, FetchFailure>,
    },
    Delete {
        id: String,
        result: Result<(), DeleteError>,
        reply: oneshot::Sender<Result<bool, DeleteError>>,
    },
}

/// Cloneable handle to a running feed session.
///
/// The session stops once every handle is dropped.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<FeedView>,
}

/// Starts a session and issues the initial page-1 query.
pub fn spawn<S>(source: Arc<S>, config: FeedConfig, current_user: Option<String>) -> FeedHandle
where
    S: PostSource + ?Sized + 'static,
{
    let mut controller = FeedController::new(config, current_user);
    let first = controller.start();

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (view_tx, view_rx) = watch::channel(controller.snapshot());

    tokio::spawn(run(source, controller, first, command_rx, view_tx));

    FeedHandle {
        commands: command_tx,
        view: view_rx,
    }
}

impl FeedHandle {
    /// Records a keystroke. The query runs once typing pauses.
    pub async fn search(&self, text: impl Into<String>) -> Result<(), FeedError> {
        self.send(Command::SearchEdited(text.into())).await
    }

    pub async fn select_scope(&self, scope: Scope) -> Result<(), FeedError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ScopeSelected(scope, tx)).await?;
        rx.await.map_err(|_| FeedError::Closed)??;
        Ok(())
    }

    pub async fn set_current_user(&self, user: Option<String>) -> Result<(), FeedError> {
        self.send(Command::UserChanged(user)).await
    }

    /// Infinite-scroll trigger. Ignored while loading or on the last page.
    pub async fn load_more(&self) -> Result<(), FeedError> {
        self.send(Command::LoadMoreVisible).await
    }

    pub async fn go_to_page(&self, page: u32) -> Result<(), FeedError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::PageSelected(page, tx)).await?;
        rx.await.map_err(|_| FeedError::Closed)??;
        Ok(())
    }

    pub async fn refresh(&self) -> Result<(), FeedError> {
        self.send(Command::Refresh).await
    }

    /// Deletes a post and drops it from the list. Returns whether it was shown.
    pub async fn delete_post(&self, id: impl Into<String>) -> Result<bool, FeedError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::DeletePost(id.into(), tx)).await?;
        Ok(rx.await.map_err(|_| FeedError::Closed)??)
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedView> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> FeedView {
        self.view.borrow().clone()
    }

    /// Waits for the first view (current one included) matching `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<FeedView, FeedError>
    where
        F: FnMut(&FeedView) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| FeedError::Closed)?;
        Ok(view.clone())
    }

    async fn send(&self, command: Command) -> Result<(), FeedError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FeedError::Closed)
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn debounce_elapsed(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn dispatch<S>(source: &Arc<S>, command: FetchCommand, done: &mpsc::UnboundedSender<Completion>)
where
    S: PostSource + ?Sized + 'static,
{
    let source = Arc::clone(source);
    let done = done.clone();
    tracing::debug!(
        "Fetching page {} ({:?}, generation {})",
        command.request.page(),
        command.mode,
        command.ticket.generation()
    );

    tokio::spawn(async move {
        let result = source.fetch_page(&command.request).await;
        // The session may already be gone
        let _ = done.send(Completion::Page {
            ticket: command.ticket,
            result,
        });
    });
}

async fn run<S>(
    source: Arc<S>,
    mut controller: FeedController,
    first: FetchCommand,
    mut commands: mpsc::Receiver<Command>,
    view: watch::Sender<FeedView>,
) where
    S: PostSource + ?Sized + 'static,
{
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    dispatch(&source, first, &done_tx);

    loop {
        let deadline = controller.debounce_deadline();

        // Completions and the debounce timer are bounded; commands go last so
        // a steady stream of them cannot starve either.
        tokio::select! {
            biased;

            Some(completion) = done_rx.recv() => match completion {
                Completion::Page { ticket, result } => {
                    controller.apply_page(ticket, result);
                }
                Completion::Delete { id, result, reply } => {
                    let result = controller.apply_delete(&id, result);
                    view.send_replace(controller.snapshot());
                    let _ = reply.send(result);
                }
            },

            _ = debounce_elapsed(deadline) => {
                if let Some(next) = controller.poll_debounce(now()) {
                    dispatch(&source, next, &done_tx);
                }
            }

            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    Command::SearchEdited(text) => controller.edit_search(text, now()),
                    Command::ScopeSelected(scope, reply) => {
                        let result = controller.select_scope(scope).map(|next| {
                            if let Some(next) = next {
                                dispatch(&source, next, &done_tx);
                            }
                        });
                        view.send_replace(controller.snapshot());
                        let _ = reply.send(result);
                    }
                    Command::UserChanged(user) => {
                        if let Some(next) = controller.set_current_user(user) {
                            dispatch(&source, next, &done_tx);
                        }
                    }
                    Command::LoadMoreVisible => {
                        if let Some(next) = controller.load_more() {
                            dispatch(&source, next, &done_tx);
                        }
                    }
                    Command::PageSelected(page, reply) => {
                        let result = controller.go_to_page(page).map(|next| {
                            if let Some(next) = next {
                                dispatch(&source, next, &done_tx);
                            }
                        });
                        view.send_replace(controller.snapshot());
                        let _ = reply.send(result);
                    }
                    Command::Refresh => {
                        let next = controller.refresh();
                        dispatch(&source, next, &done_tx);
                    }
                    Command::DeletePost(id, reply) => {
                        let source = Arc::clone(&source);
                        let done = done_tx.clone();
                        tokio::spawn(async move {
                            let result = source.delete_post(&id).await;
                            let _ = done.send(Completion::Delete { id, result, reply });
                        });
                    }
                }
            }
        }

        view.send_replace(controller.snapshot());
    }

    tracing::debug!("Feed session stopped");
}
