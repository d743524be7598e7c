use std::collections::HashMap;

use crate::value::Callback;

/// Bidirectional callback intern table.
///
/// Outbound callbacks get a small id the peer can name in nested frames;
/// the same callback (by identity) always reuses its id. Both directions
/// hold strong references, so an interned callback stays invokable until
/// it is released or the port is destroyed.
pub(crate) struct CallbackMap {
    next_id: i64,
    ids: HashMap<usize, i64>,
    callbacks: HashMap<i64, Callback>,
}

impl CallbackMap {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ids: HashMap::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Id for `callback`, allocating on first sight.
    pub fn intern(&mut self, callback: &Callback) -> i64 {
        if let Some(&id) = self.ids.get(&callback.key()) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(callback.key(), id);
        self.callbacks.insert(id, callback.clone());
        id
    }

    /// The callback interned under `id`, if still mapped.
    pub fn get(&self, id: i64) -> Option<Callback> {
        self.callbacks.get(&id).cloned()
    }

    /// Drop `callback` from both directions. Returns whether it was mapped.
    /// Its id is retired, not recycled.
    pub fn release(&mut self, callback: &Callback) -> bool {
        match self.ids.remove(&callback.key()) {
            Some(id) => {
                self.callbacks.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.callbacks.clear();
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }
}
