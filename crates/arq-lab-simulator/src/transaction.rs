use arq_lab_abstract::TxId;

/// Mints attempt ids and decides whether an ACK's id is still the live one.
#[derive(Debug, Default, Clone)]
pub struct TransactionRegistry {
    current: TxId,
    last_handled: TxId,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new send-or-resend attempt. Ids strictly increase within a run.
    pub fn begin_transaction(&mut self) -> TxId {
        self.current = TxId(self.current.0 + 1);
        self.current
    }

    /// An id is valid while it is the current attempt and has not been handled yet.
    pub fn is_valid(&self, id: TxId) -> bool {
        id == self.current && id > self.last_handled
    }

    /// Called once, when an ACK for `id` is accepted.
    pub fn mark_handled(&mut self, id: TxId) {
        self.last_handled = id;
    }

    pub fn current(&self) -> TxId {
        self.current
    }

    #[cfg(test)]
    pub fn last_handled(&self) -> TxId {
        self.last_handled
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
