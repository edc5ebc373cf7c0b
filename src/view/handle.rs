use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::model::{FeedId, Filter};

use super::actor::ViewCommand;
use super::optimistic::DeleteAllConfirmed;
use super::state::ViewState;

/// Owner side of an active view. Dropping it deactivates the view: the task
/// stops, its push subscription is released and in-flight pulls are discarded.
pub struct ViewHandle {
    commands: mpsc::Sender<ViewCommand>,
    state: watch::Receiver<ViewState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ViewHandle {
    pub(super) fn new(
        commands: mpsc::Sender<ViewCommand>,
        state: watch::Receiver<ViewState>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self { commands, state, cancel, task: Some(task) }
    }

    pub async fn send(&self, cmd: ViewCommand) -> Result<()> {
        self.commands.send(cmd).await.map_err(|_| anyhow!("view is no longer active"))
    }

    pub async fn set_filter(&self, filter: Filter) -> Result<()> { self.send(ViewCommand::SetFilter(filter)).await }

    pub async fn go_to_page(&self, page: u32) -> Result<()> { self.send(ViewCommand::GoToPage(page)).await }

    pub async fn jump_to_first_page(&self) -> Result<()> { self.send(ViewCommand::JumpToFirstPage).await }

    pub async fn mark_read(&self, id: FeedId) -> Result<()> { self.send(ViewCommand::MarkRead(id)).await }

    pub async fn delete_all(&self, confirmed: DeleteAllConfirmed) -> Result<()> {
        self.send(ViewCommand::DeleteAll(confirmed)).await
    }

    pub fn state(&self) -> ViewState { self.state.borrow().clone() }

    pub fn watch(&self) -> watch::Receiver<ViewState> { self.state.clone() }

    /// Waits until the published state satisfies `pred`, checking the current state first.
    pub async fn wait_for(&mut self, pred: impl FnMut(&ViewState) -> bool) -> Result<ViewState> {
        let state = self.state.wait_for(pred).await.map_err(|_| anyhow!("view stopped"))?;
        Ok(state.clone())
    }

    pub async fn deactivate(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
