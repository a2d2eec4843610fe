//! Pointer trail state: a distance gate in front of a cyclic pool of image slots.
//!
//! Each qualifying pointer sample yields a [`TrailSpawn`] describing which slot to reuse,
//! where to put it, how to stack it and how to animate it. The DOM side only applies it.

use crate::spring::{Spring, SpringEasing};

pub const DEFAULT_RENDER_DISTANCE: f64 = 50.0;
pub const DEFAULT_ROTATION_RANGE: f64 = 25.0;
pub const FADE_OUT_DELAY_MS: f64 = 5_000.0;
pub const FADE_OUT_DURATION_MS: f64 = 500.0;
pub const ENTRY_EASING_STOPS: usize = 48;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset_by(self, origin: Point) -> Point {
        Point::new(self.x - origin.x, self.y - origin.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailConfig {
    /// Minimum pointer travel in px between two spawns.
    pub render_distance: f64,
    /// Upper bound (exclusive) of the random rotation in degrees.
    pub rotation_range: f64,
    pub spring: Spring,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            render_distance: DEFAULT_RENDER_DISTANCE,
            rotation_range: DEFAULT_ROTATION_RANGE,
            spring: Spring::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrailState {
    last_trigger: Point,
    spawn_count: u64,
}

impl TrailState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_trigger(&self) -> Point {
        self.last_trigger
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawn_count
    }

    /// Feeds one pointer sample. `random` is only drawn when a spawn happens and must
    /// return a value in `[0, 1)`. With an empty pool nothing changes.
    pub fn pointer_moved(
        &mut self,
        config: &TrailConfig,
        pool_size: usize,
        point: Point,
        random: impl FnOnce() -> f64,
    ) -> Option<TrailSpawn> {
        if pool_size == 0 {
            return None;
        }

        if self.last_trigger.distance_to(point) < config.render_distance {
            return None;
        }

        self.last_trigger = point;
        Some(self.spawn(config, pool_size, random()))
    }

    fn spawn(&mut self, config: &TrailConfig, pool_size: usize, sample: f64) -> TrailSpawn {
        let slot = (self.spawn_count % pool_size as u64) as usize;
        let spawn = TrailSpawn {
            slot,
            z_index: self.spawn_count,
            position: self.last_trigger,
            rotation: rotation_from_sample(sample, config.rotation_range),
        };

        self.spawn_count += 1;
        spawn
    }
}

fn rotation_from_sample(sample: f64, range: f64) -> f64 {
    if !sample.is_finite() || !range.is_finite() || range <= 0.0 {
        return 0.0;
    }

    sample.clamp(0.0, 1.0 - f64::EPSILON) * range
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrailSpawn {
    pub slot: usize,
    pub z_index: u64,
    pub position: Point,
    pub rotation: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub opacity: f64,
    pub transform: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationPlan {
    pub keyframes: Vec<Keyframe>,
    pub duration_ms: f64,
    pub delay_ms: f64,
    pub easing: String,
}

impl TrailSpawn {
    fn signed_rotation(&self, negative: bool) -> String {
        let sign = if negative { "-" } else { "" };
        format!("rotate({sign}{:.3}deg)", self.rotation)
    }

    pub fn entry_transform(&self) -> String {
        format!(
            "translate(-50%, -25%) scale(0.5) {}",
            self.signed_rotation(self.slot % 2 == 0)
        )
    }

    pub fn settle_transform(&self) -> String {
        format!(
            "translate(-50%, -50%) scale(1) {}",
            self.signed_rotation(self.slot % 2 != 0)
        )
    }

    pub fn entry_animation(&self, easing: &SpringEasing) -> AnimationPlan {
        AnimationPlan {
            keyframes: vec![
                Keyframe {
                    opacity: 0.0,
                    transform: Some(self.entry_transform()),
                },
                Keyframe {
                    opacity: 1.0,
                    transform: Some(self.settle_transform()),
                },
            ],
            duration_ms: easing.duration_ms,
            delay_ms: 0.0,
            easing: easing.css.clone(),
        }
    }

    pub fn exit_animation(&self) -> AnimationPlan {
        AnimationPlan {
            keyframes: vec![
                Keyframe {
                    opacity: 1.0,
                    transform: None,
                },
                Keyframe {
                    opacity: 0.0,
                    transform: None,
                },
            ],
            duration_ms: FADE_OUT_DURATION_MS,
            delay_ms: FADE_OUT_DELAY_MS,
            easing: "linear".to_string(),
        }
    }
}
