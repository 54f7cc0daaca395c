/// What happened to a watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Commands sent to the watch thread.
#[derive(Debug)]
pub(super) enum Command {
    /// Re-attach vanished directories now instead of on the next tick.
    Maintain,
    Shutdown,
}
