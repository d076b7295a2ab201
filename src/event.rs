use std::mem;

/// Outbound change notification for the rendering collaborator.
///
/// Payloads are hints; consumers re-derive state through the query surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNotification {
    /// The forest was replaced and every derived state reset.
    DataReplaced { total: usize, diagnostics: usize },
    NodeExpanded { id: String },
    NodeCollapsed { id: String },
    /// Every node was collapsed.
    AllCollapsed,
    NodeSelected { id: String },
    NodeDeselected { id: String },
    SelectionCleared,
    FocusChanged { id: Option<String> },
    SearchPerformed { query: String, matches: usize },
    SearchCleared,
    /// An inline edit finished with a label different from the original.
    EditCommitted {
        id: String,
        previous: String,
        label: String,
    },
    /// A batch closed; carries everything raised while it was open, in order.
    BatchChanged { notifications: Vec<Self> },
}

/// Outbox with a nestable batch boundary.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    outbox: Vec<TreeNotification>,
    pending: Vec<TreeNotification>,
    depth: usize,
}

impl NotificationQueue {
    pub const fn new() -> Self {
        Self {
            outbox: Vec::new(),
            pending: Vec::new(),
            depth: 0,
        }
    }

    /// Queues a notification, buffering it while a batch is open.
    pub fn emit(&mut self, notification: TreeNotification) {
        if self.depth > 0 {
            self.pending.push(notification);
        } else {
            self.outbox.push(notification);
        }
    }

    pub const fn begin_batch(&mut self) {
        self.depth += 1;
    }

    /// Closes one batch level; returns `false` if no batch was open.
    pub fn end_batch(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        if self.depth == 0 {
            let notifications = mem::take(&mut self.pending);
            log::debug!("batch closed with {} notifications", notifications.len());
            self.outbox
                .push(TreeNotification::BatchChanged { notifications });
        }
        true
    }

    /// Current batch nesting depth.
    #[inline]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Takes every notification emitted so far.
    pub fn drain(&mut self) -> Vec<TreeNotification> {
        mem::take(&mut self.outbox)
    }

    /// Returns the notifications not yet drained.
    pub fn pending(&self) -> &[TreeNotification] {
        &self.outbox
    }
}

/// State holder that publishes [`TreeNotification`]s through a [`NotificationQueue`].
pub trait ObservableState {
    fn notifications(&self) -> &NotificationQueue;
    fn notifications_mut(&mut self) -> &mut NotificationQueue;

    /// Opens a batch; nested opens increase the depth.
    fn begin_batch(&mut self) {
        self.notifications_mut().begin_batch();
    }

    /// Closes a batch; the outermost close emits one [`TreeNotification::BatchChanged`].
    fn end_batch(&mut self) -> bool {
        self.notifications_mut().end_batch()
    }

    /// Runs `f` inside a batch boundary.
    fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }

    fn drain_notifications(&mut self) -> Vec<TreeNotification> {
        self.notifications_mut().drain()
    }
}
