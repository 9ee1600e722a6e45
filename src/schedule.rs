use std::time::Duration;

use bevy::prelude::*;

/// Single-shot delayed actions owned by an entity. Despawning the entity
/// drops whatever is still pending.
#[derive(Component, Debug)]
pub struct ScheduledActions<A: Send + Sync + 'static> {
    pending: Vec<(Timer, A)>,
}

impl<A: Send + Sync + 'static> Default for ScheduledActions<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<A: Copy + Send + Sync + 'static> ScheduledActions<A> {
    pub fn schedule(&mut self, delay_secs: f32, action: A) {
        self.pending.push((
            Timer::from_seconds(delay_secs.max(0.0), TimerMode::Once),
            action,
        ));
    }

    /// Advance every timer and return the actions that came due, in the
    /// order they were scheduled.
    pub fn tick(&mut self, delta: Duration) -> Vec<A> {
        let mut due = Vec::new();
        self.pending.retain_mut(|(timer, action)| {
            timer.tick(delta);
            if timer.finished() {
                due.push(*action);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Step {
        Open,
        Close,
    }

    #[test]
    fn action_fires_once_after_delay() {
        let mut actions = ScheduledActions::default();
        actions.schedule(1.5, Step::Open);

        assert!(actions.tick(Duration::from_secs_f32(1.0)).is_empty());
        assert_eq!(actions.len(), 1, "still waiting on the open");
        assert_eq!(actions.tick(Duration::from_secs_f32(0.5)), vec![Step::Open]);
        assert!(actions.is_empty());
        assert!(actions.tick(Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn due_actions_keep_schedule_order() {
        let mut actions = ScheduledActions::default();
        actions.schedule(0.5, Step::Close);
        actions.schedule(0.25, Step::Open);
        assert_eq!(
            actions.tick(Duration::from_secs(1)),
            vec![Step::Close, Step::Open]
        );
    }

    #[test]
    fn zero_delay_fires_on_next_tick() {
        let mut actions = ScheduledActions::default();
        actions.schedule(0.0, Step::Open);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions.tick(Duration::ZERO), vec![Step::Open]);
    }
}
