use bevy::prelude::*;
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TorchLitRecord {
    pub level: String,
    pub torch_id: u32,
    pub at_secs: f32,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LevelCompletion {
    pub level: String,
    pub duration_secs: f32,
    pub torches_lit: usize,
}

/// Per-session play analytics: which torches were lit in which order and
/// how long each level took. Kept in memory; summarized to the log on exit.
#[derive(Resource, Serialize, Default, Debug)]
pub struct Analytics {
    pub level: Option<String>,
    pub level_started_at: f32,
    pub torches: Vec<TorchLitRecord>,
    pub completions: Vec<LevelCompletion>,
}

impl Analytics {
    pub fn set_level(&mut self, level: impl Into<String>, now_secs: f32) {
        let level = level.into();
        info!("[Torchbearer analytics] level {level} started");
        self.level = Some(level);
        self.level_started_at = now_secs;
    }

    pub fn torch_lit(&mut self, torch_id: u32, now_secs: f32) {
        let level = self.level.clone().unwrap_or_default();
        info!("[Torchbearer analytics] torch {torch_id} lit in {level}");
        self.torches.push(TorchLitRecord {
            level,
            torch_id,
            at_secs: now_secs,
        });
    }

    pub fn level_complete(&mut self, now_secs: f32) -> &LevelCompletion {
        let level = self.level.clone().unwrap_or_default();
        let torches_lit = self.torches.iter().filter(|t| t.level == level).count();
        let duration_secs = (now_secs - self.level_started_at).max(0.0);
        info!("[Torchbearer analytics] {level} completed in {duration_secs:.2}s");
        self.completions.push(LevelCompletion {
            level,
            duration_secs,
            torches_lit,
        });
        &self.completions[self.completions.len() - 1]
    }

    pub fn torches_lit_in(&self, level: &str) -> Vec<u32> {
        self.torches
            .iter()
            .filter(|t| t.level == level)
            .map(|t| t.torch_id)
            .collect()
    }
}

pub struct AnalyticsPlugin;

impl Plugin for AnalyticsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Analytics::default())
            .add_systems(Last, log_summary_on_exit);
    }
}

fn log_summary_on_exit(mut exits: EventReader<AppExit>, analytics: Res<Analytics>) {
    if exits.read().next().is_none() {
        return;
    }
    match serde_json::to_string(&*analytics) {
        Ok(summary) => info!("[Torchbearer analytics] session summary {summary}"),
        Err(e) => warn!("[Torchbearer analytics] could not serialize summary: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_measures_time_since_level_start() {
        let mut analytics = Analytics::default();
        analytics.set_level("Level1", 2.0);
        analytics.torch_lit(2, 5.0);
        analytics.torch_lit(0, 7.5);
        let done = analytics.level_complete(12.5).clone();
        assert_eq!(done.level, "Level1");
        assert!((done.duration_secs - 10.5).abs() < 0.001);
        assert_eq!(done.torches_lit, 2);
        assert_eq!(analytics.torches_lit_in("Level1"), vec![2, 0]);
    }

    #[test]
    fn torches_are_scoped_to_their_level() {
        let mut analytics = Analytics::default();
        analytics.set_level("Level1", 0.0);
        analytics.torch_lit(1, 1.0);
        analytics.set_level("Level2", 3.0);
        analytics.torch_lit(1, 4.0);
        assert_eq!(analytics.level_complete(6.0).torches_lit, 1);
        assert!((analytics.completions[0].duration_secs - 3.0).abs() < 0.001);
    }
}
