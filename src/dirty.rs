/// Copy of the last loaded or committed settings. Lets `save` skip the flash when the
/// application calls it without having changed anything.
pub(crate) struct DirtyTracker<S> {
    snapshot: Option<S>,
}

impl<S: Clone + PartialEq> DirtyTracker<S> {
    pub(crate) const fn new() -> Self {
        Self { snapshot: None }
    }

    pub(crate) fn snapshot(&mut self, settings: &S) {
        self.snapshot = Some(settings.clone());
    }

    /// Everything is dirty until the first snapshot.
    pub(crate) fn is_dirty(&self, current: &S) -> bool {
        self.snapshot.as_ref() != Some(current)
    }
}
