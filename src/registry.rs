use indexmap::IndexMap;
use std::time::{Duration, Instant};

use crate::ansi::sanitize;
use crate::config::RemovalDelay;
use crate::event::TaskProgress;

#[derive(Debug, Clone)]
pub struct TaskState {
    pub id: String,
    pub current: u64,
    pub total: Option<u64>,
    pub prefix: String,
    pub suffix: String,
    pub display_time: bool,
    pub keep_alive: bool,
    pub created_at: Instant,
    pub last_updated_at: Instant,
    completed_at: Option<Instant>,
    completed_ticks: u32,
    slot: Option<usize>,
}

impl TaskState {
    fn new(id: String, now: Instant) -> Self {
        Self {
            prefix: sanitize(&id),
            id,
            current: 0,
            total: None,
            suffix: String::new(),
            display_time: false,
            keep_alive: false,
            created_at: now,
            last_updated_at: now,
            completed_at: None,
            completed_ticks: 0,
            slot: None,
        }
    }

    pub fn completed(&self) -> bool {
        matches!(self.total, Some(total) if self.current >= total)
    }

    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    fn touch(&mut self, now: Instant) {
        self.last_updated_at = now;
        self.completed_ticks = 0;
        if !self.completed() {
            self.completed_at = None;
        } else if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    fn view(&self, now: Instant) -> TaskView {
        let finished = self.completed_at.is_some();
        let elapsed = self.display_time.then(|| {
            self.completed_at
                .unwrap_or(now)
                .saturating_duration_since(self.created_at)
        });
        TaskView {
            id: self.id.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            current: self.current,
            total: self.total,
            elapsed,
            finished,
        }
    }
}

/// What the layout needs to draw one task, frozen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub id: String,
    pub prefix: String,
    pub suffix: String,
    pub current: u64,
    pub total: Option<u64>,
    /// Only present for tasks that display their elapsed time.
    pub elapsed: Option<Duration>,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// A permanent slot, empty until a task claims it.
    Slot(Option<TaskView>),
    Task(TaskView),
}

/// Owns every task and the permanent slot assignments. Only the consumer loop touches it.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: IndexMap<String, TaskState>,
    slots: Vec<Option<String>>,
}

impl TaskRegistry {
    pub fn new(slot_count: usize) -> Self {
        Self {
            tasks: IndexMap::new(),
            slots: vec![None; slot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TaskState> {
        self.tasks.get(id)
    }

    /// Applies a progress update, creating the task if the id is unknown. Blank ids are ignored.
    pub fn upsert(&mut self, id: &str, current: u64, total: Option<u64>, now: Instant) {
        let Some(task) = self.entry(id, now) else {
            return;
        };
        task.current = current;
        if total.is_some() {
            task.total = total;
        }
        task.touch(now);
    }

    /// Registers a task or replaces its static fields. Progress and age are kept.
    pub fn set_task(&mut self, id: &str, progress: TaskProgress, now: Instant) {
        let Some(task) = self.entry(id, now) else {
            return;
        };
        task.total = progress.total;
        task.prefix = progress.prefix;
        task.suffix = progress.suffix;
        task.display_time = progress.display_time;
        task.keep_alive = progress.keep_alive;
        task.touch(now);
    }

    fn entry(&mut self, id: &str, now: Instant) -> Option<&mut TaskState> {
        if id.trim().is_empty() {
            log::warn!("ignoring task event with a blank id");
            return None;
        }
        if !self.tasks.contains_key(id) {
            let mut task = TaskState::new(id.to_owned(), now);
            if let Some(free) = self.slots.iter().position(Option::is_none) {
                self.slots[free] = Some(id.to_owned());
                task.slot = Some(free);
            }
            self.tasks.insert(id.to_owned(), task);
        }
        self.tasks.get_mut(id)
    }

    /// Resizes the permanent slot area. Tasks in slots that no longer exist become ordinary
    /// tasks again; new slots wait for the next new task.
    pub fn set_slot_count(&mut self, count: usize) {
        if count < self.slots.len() {
            for id in self.slots.drain(count..).flatten() {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.slot = None;
                }
            }
        } else {
            self.slots.resize(count, None);
        }
    }

    /// Drops completed tasks whose removal delay has run out and returns their ids.
    pub fn tick(&mut self, now: Instant, delay: RemovalDelay) -> Vec<String> {
        let mut removed = Vec::new();
        for task in self.tasks.values_mut() {
            if task.slot.is_some() || task.keep_alive || !task.completed() {
                continue;
            }
            task.completed_ticks = task.completed_ticks.saturating_add(1);
            let expired = match delay {
                RemovalDelay::After(delay) => {
                    now.saturating_duration_since(task.last_updated_at) >= delay
                }
                RemovalDelay::AfterTicks(ticks) => task.completed_ticks > ticks,
                RemovalDelay::Never => false,
            };
            if expired {
                removed.push(task.id.clone());
            }
        }
        for id in &removed {
            self.tasks.shift_remove(id);
            log::debug!("removed completed task {id}");
        }
        removed
    }

    /// Permanent slots first, in slot order, then every other task in insertion order.
    pub fn snapshot(&self, now: Instant) -> Vec<Row> {
        let slots = self.slots.iter().map(|id| {
            let task = id.as_ref().and_then(|id| self.tasks.get(id));
            Row::Slot(task.map(|task| task.view(now)))
        });
        let rest = self
            .tasks
            .values()
            .filter(|task| task.slot.is_none())
            .map(|task| Row::Task(task.view(now)));
        slots.chain(rest).collect()
    }
}

#[cfg(test)]
mod test {
    use super::{Row, TaskRegistry};
    use crate::config::RemovalDelay;
    use crate::event::TaskProgress;
    use std::time::{Duration, Instant};

    const DELAY: RemovalDelay = RemovalDelay::After(Duration::from_millis(500));

    fn ids(rows: &[Row]) -> Vec<Option<String>> {
        rows.iter()
            .map(|row| match row {
                Row::Slot(task) => task.as_ref().map(|task| task.id.clone()),
                Row::Task(task) => Some(task.id.clone()),
            })
            .collect()
    }

    #[test]
    fn last_consumed_update_wins() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 7, Some(10), now);
        registry.upsert("a", 3, None, now);
        registry.tick(now, DELAY);
        let task = registry.get("a").unwrap();
        assert_eq!(task.current, 3);
        assert_eq!(task.total, Some(10));
    }

    #[test]
    fn keep_alive_task_is_never_removed() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.set_task("a", TaskProgress::new(5).keep_alive(true), start);
        registry.upsert("a", 5, None, start);
        let removed = registry.tick(start + Duration::from_secs(86_400 * 365), DELAY);
        assert!(removed.is_empty());
        assert!(registry.get("a").is_some());
    }

    #[test]
    fn completed_task_is_removed_exactly_at_delay() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 10, Some(10), start);

        registry.tick(start + Duration::from_millis(499), DELAY);
        assert!(registry.get("a").is_some());

        let removed = registry.tick(start + Duration::from_millis(500), DELAY);
        assert_eq!(removed, vec!["a".to_owned()]);
        assert!(registry.is_empty());
    }

    #[test]
    fn unfinished_task_is_kept() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 9, Some(10), start);
        registry.upsert("b", 4, None, start);
        registry.tick(start + Duration::from_secs(3600), DELAY);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn tick_based_removal_counts_completed_ticks() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 1, Some(1), now);
        assert!(registry.tick(now, RemovalDelay::AfterTicks(2)).is_empty());
        assert!(registry.tick(now, RemovalDelay::AfterTicks(2)).is_empty());
        assert_eq!(registry.tick(now, RemovalDelay::AfterTicks(2)), vec!["a".to_owned()]);
    }

    #[test]
    fn never_policy_keeps_everything() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 1, Some(1), start);
        registry.tick(start + Duration::from_secs(3600), RemovalDelay::Never);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn permanent_slots_keep_first_tasks() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(2);
        registry.upsert("first", 1, Some(1), start);
        registry.upsert("second", 0, Some(4), start);
        registry.upsert("third", 0, Some(4), start);
        registry.upsert("fourth", 2, Some(2), start);

        let later = start + Duration::from_secs(10);
        registry.tick(later, DELAY);
        // "first" is complete but pinned; "fourth" is complete and gone.
        assert_eq!(
            ids(&registry.snapshot(later)),
            vec![
                Some("first".to_owned()),
                Some("second".to_owned()),
                Some("third".to_owned())
            ]
        );

        registry.upsert("third", 4, None, later);
        registry.tick(later + Duration::from_secs(1), DELAY);
        registry.upsert("fifth", 0, None, later);
        let rows = registry.snapshot(later);
        assert_eq!(ids(&rows)[..2], [Some("first".to_owned()), Some("second".to_owned())]);
        assert_eq!(ids(&rows)[2], Some("fifth".to_owned()));
    }

    #[test]
    fn unclaimed_slots_render_empty() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(3);
        registry.upsert("a", 0, None, now);
        assert_eq!(ids(&registry.snapshot(now)), vec![Some("a".to_owned()), None, None]);
    }

    #[test]
    fn shrinking_slots_releases_trailing_tasks() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(2);
        registry.upsert("a", 0, Some(1), now);
        registry.upsert("b", 1, Some(1), now);
        registry.set_slot_count(1);
        assert_eq!(registry.get("b").unwrap().slot(), None);

        let removed = registry.tick(now + Duration::from_secs(1), DELAY);
        assert_eq!(removed, vec!["b".to_owned()]);

        registry.set_slot_count(2);
        registry.upsert("c", 0, None, now);
        assert_eq!(registry.get("c").unwrap().slot(), Some(1));
    }

    #[test]
    fn update_after_removal_creates_fresh_task() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.set_task("a", TaskProgress::new(2).prefix("Copying"), start);
        registry.upsert("a", 2, None, start);
        registry.tick(start + Duration::from_secs(1), DELAY);
        assert!(registry.get("a").is_none());

        registry.upsert("a", 1, None, start + Duration::from_secs(2));
        let task = registry.get("a").unwrap();
        assert_eq!(task.prefix, "a");
        assert_eq!(task.total, None);
        assert_eq!(task.current, 1);
    }

    #[test]
    fn set_task_replaces_static_fields_and_keeps_progress() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 3, None, now);
        registry.set_task("a", TaskProgress::new(8).prefix("Loading").suffix("files"), now);
        let task = registry.get("a").unwrap();
        assert_eq!(task.current, 3);
        assert_eq!(task.total, Some(8));
        assert_eq!(task.prefix, "Loading");
        assert_eq!(task.suffix, "files");
    }

    #[test]
    fn blank_ids_are_ignored() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(1);
        registry.upsert("", 1, None, now);
        registry.set_task("   ", TaskProgress::new(1), now);
        assert!(registry.is_empty());
        assert_eq!(ids(&registry.snapshot(now)), vec![None]);
    }

    #[test]
    fn elapsed_time_freezes_on_completion() {
        let start = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.set_task("a", TaskProgress::new(2).display_time(true), start);
        registry.upsert("a", 2, None, start + Duration::from_secs(5));

        let rows = registry.snapshot(start + Duration::from_secs(60));
        let Row::Task(view) = &rows[0] else {
            panic!("expected a plain task row");
        };
        assert!(view.finished);
        assert_eq!(view.elapsed, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_total_counts_as_complete() {
        let now = Instant::now();
        let mut registry = TaskRegistry::new(0);
        registry.upsert("a", 0, Some(0), now);
        assert!(registry.get("a").unwrap().completed());
    }
}
