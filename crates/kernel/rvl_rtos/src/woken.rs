/// "Higher priority task woken" flag threaded through interrupt handlers.
///
/// ISR-context operations set it when they make ready a task that should
/// preempt the interrupted one. The dispatcher switches context once, after
/// every handler has run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Woken(bool);

impl Woken {
    #[must_use]
    pub const fn new() -> Self {
        Self(false)
    }

    pub fn set(&mut self) {
        self.0 = true;
    }

    pub fn merge(&mut self, woke: bool) {
        self.0 |= woke;
    }

    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0
    }
}
