use crate::engine::Handle;
use crate::event::TaskProgress;

/// Iterator adapter that reports one progress step per item it yields.
pub struct Tracked<I> {
    inner: I,
    handle: Handle,
    id: String,
    seen: u64,
    total_known: bool,
    finished: bool,
}

impl Handle {
    /// Wraps `items` in a task. A total given in `progress` is kept. Without one the total
    /// comes from an exact size hint, or is fixed to the item count once the iterator runs dry.
    pub fn track<T: IntoIterator>(
        &self,
        id: impl Into<String>,
        mut progress: TaskProgress,
        items: T,
    ) -> Tracked<T::IntoIter> {
        let inner = items.into_iter();
        let id = id.into();
        if progress.total.is_none() {
            if let (lower, Some(upper)) = inner.size_hint() {
                if lower == upper {
                    progress.total = Some(lower as u64);
                }
            }
        }
        let total_known = progress.total.is_some();
        self.set_task(id.clone(), progress);
        Tracked {
            inner,
            handle: self.clone(),
            id,
            seen: 0,
            total_known,
            finished: false,
        }
    }
}

impl<I: Iterator> Iterator for Tracked<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        match self.inner.next() {
            Some(item) => {
                self.seen += 1;
                self.handle.update(self.id.as_str(), self.seen);
                Some(item)
            }
            None => {
                if !self.finished && !self.total_known {
                    self.handle
                        .update_with_total(self.id.as_str(), self.seen, self.seen);
                }
                self.finished = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
