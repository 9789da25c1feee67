//! Ring buffer whose dequeued slots keep their value for later reuse.

/// FIFO queue backed by a ring of slots.
///
/// `dequeue` hands out a clone and leaves the value in its slot. Once the ring
/// wraps around, [`try_enqueue_existing`](Self::try_enqueue_existing) puts that
/// old value back at the tail instead of the caller allocating a new one.
#[derive(Debug)]
pub struct ReusableQueue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Default for ReusableQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReusableQueue<T> {
    const MIN_GROW: usize = 4;

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn enqueue(&mut self, item: T) {
        if self.len == self.slots.len() {
            self.grow();
        }
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.slots.len();
        self.len += 1;
    }

    /// Re-enqueue the value left behind in the tail slot by an earlier
    /// `dequeue`. Returns `None` if the queue is full or the slot never held
    /// a value; the caller then enqueues a fresh one.
    pub fn try_enqueue_existing(&mut self) -> Option<&T> {
        if self.len == self.slots.len() || self.slots[self.tail].is_none() {
            return None;
        }
        let index = self.tail;
        self.tail = (self.tail + 1) % self.slots.len();
        self.len += 1;
        self.slots[index].as_ref()
    }

    #[cfg(test)]
    fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Live items from oldest to newest.
    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &T> {
        let capacity = self.slots.len();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    fn grow(&mut self) {
        let capacity = self.slots.len();
        let new_capacity = (capacity * 2).max(Self::MIN_GROW);
        let mut slots = Vec::with_capacity(new_capacity);
        for i in 0..self.len {
            slots.push(self.slots[(self.head + i) % capacity].take());
        }
        slots.resize_with(new_capacity, || None);
        self.slots = slots;
        self.head = 0;
        self.tail = self.len;
    }
}

impl<T: Clone> ReusableQueue<T> {
    /// Remove the oldest item. Its slot keeps a copy for `try_enqueue_existing`.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].clone();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        item
    }
}
