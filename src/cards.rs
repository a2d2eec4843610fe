use std::collections::HashMap;

use crate::trail::Point;

pub const DRAG_ELASTIC: f64 = 0.65;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardPlacement {
    pub rotate_deg: f64,
    pub top_percent: f64,
    pub left_percent: f64,
}

/// Fanned-out resting spot of the card at `index` in the stack.
pub fn card_placement(index: usize) -> CardPlacement {
    let index = index as f64;
    CardPlacement {
        rotate_deg: (index - 2.0) * 6.0,
        top_percent: 15.0 + index * 5.0,
        left_percent: 20.0 + index * 7.0,
    }
}

/// Stacking order of the cards keyed by image URL. Untouched cards sit at 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CardLayers {
    levels: HashMap<String, i32>,
}

impl CardLayers {
    pub fn level(&self, key: &str) -> i32 {
        self.levels.get(key).copied().unwrap_or(0)
    }

    pub fn top_level(&self) -> i32 {
        self.levels.values().copied().max().unwrap_or(0).max(0)
    }

    /// Puts `key` one above the current highest card and returns its new level.
    pub fn raise(&mut self, key: &str) -> i32 {
        let next = self.top_level().saturating_add(1);
        self.levels.insert(key.to_string(), next);
        next
    }

    /// Forgets cards that left the pool.
    pub fn retain_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        let keep = keys.into_iter().collect::<Vec<_>>();
        self.levels.retain(|key, _| keep.contains(&key.as_str()));
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Lets `value` run past the range, scaled down by `elastic`.
    pub fn elastic(&self, value: f64, elastic: f64) -> f64 {
        if value < self.min {
            self.min + (value - self.min) * elastic
        } else if value > self.max {
            self.max + (value - self.max) * elastic
        } else {
            value
        }
    }
}

/// Allowed drag offsets that keep a card inside its container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragBounds {
    pub x: Range,
    pub y: Range,
}

impl DragBounds {
    /// `card` is measured while the card sits at `offset`.
    pub fn new(container: Rect, card: Rect, offset: Point) -> Self {
        Self {
            x: Range::new(
                offset.x + container.left - card.left,
                offset.x + container.right() - card.right(),
            ),
            y: Range::new(
                offset.y + container.top - card.top,
                offset.y + container.bottom() - card.bottom(),
            ),
        }
    }

    pub fn elastic(&self, offset: Point, elastic: f64) -> Point {
        Point::new(self.x.elastic(offset.x, elastic), self.y.elastic(offset.y, elastic))
    }

    pub fn clamp(&self, offset: Point) -> Point {
        Point::new(self.x.clamp(offset.x), self.y.clamp(offset.y))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragSession {
    pointer_id: i32,
    grab: Point,
    origin: Point,
    bounds: DragBounds,
}

impl DragSession {
    pub fn start(pointer_id: i32, grab: Point, origin: Point, bounds: DragBounds) -> Self {
        Self {
            pointer_id,
            grab,
            origin,
            bounds,
        }
    }

    pub fn pointer_id(&self) -> i32 {
        self.pointer_id
    }

    pub fn drag_to(&self, pointer: Point) -> Point {
        let raw = Point::new(
            self.origin.x + pointer.x - self.grab.x,
            self.origin.y + pointer.y - self.grab.y,
        );
        self.bounds.elastic(raw, DRAG_ELASTIC)
    }

    pub fn release(&self, pointer: Point) -> Point {
        self.bounds.clamp(self.drag_to(pointer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placements_fan_out_around_the_third_card() {
        assert_eq!(
            card_placement(0),
            CardPlacement {
                rotate_deg: -12.0,
                top_percent: 15.0,
                left_percent: 20.0,
            }
        );
        assert_eq!(card_placement(2).rotate_deg, 0.0);
        assert_eq!(card_placement(5).left_percent, 55.0);
        assert_eq!(card_placement(5).top_percent, 40.0);
    }

    #[test]
    fn raising_lands_one_above_the_highest() {
        let mut layers = CardLayers::default();
        assert_eq!(layers.level("a"), 0);

        assert_eq!(layers.raise("a"), 1);
        assert_eq!(layers.raise("b"), 2);
        assert_eq!(layers.raise("c"), 3);
        assert_eq!(layers.raise("a"), 4);
        // Touching the topmost card again still moves it up.
        assert_eq!(layers.raise("a"), 5);
        assert_eq!(layers.level("b"), 2);
        assert!(layers.level("a") > layers.level("c"));
    }

    #[test]
    fn replaced_pool_forgets_old_layers() {
        let mut layers = CardLayers::default();
        layers.raise("old");
        layers.raise("kept");

        layers.retain_keys(["kept", "new"]);
        assert_eq!(layers.level("old"), 0);
        assert_eq!(layers.level("kept"), 2);
        assert_eq!(layers.raise("new"), 3);
    }

    #[test]
    fn elastic_is_identity_inside_bounds() {
        let range = Range::new(-10.0, 10.0);
        assert_eq!(range.elastic(3.0, DRAG_ELASTIC), 3.0);
        assert_eq!(range.elastic(-10.0, DRAG_ELASTIC), -10.0);
        assert!((range.elastic(30.0, DRAG_ELASTIC) - 23.0).abs() < 1e-9);
        assert!((range.elastic(-30.0, DRAG_ELASTIC) + 23.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_keep_the_card_inside_the_container() {
        let container = Rect {
            left: 0.0,
            top: 0.0,
            width: 1000.0,
            height: 800.0,
        };
        let card = Rect {
            left: 200.0,
            top: 100.0,
            width: 200.0,
            height: 250.0,
        };

        let bounds = DragBounds::new(container, card, Point::default());
        assert_eq!(bounds.x, Range { min: -200.0, max: 600.0 });
        assert_eq!(bounds.y, Range { min: -100.0, max: 450.0 });

        // Same card already dragged by (50, 50): bounds are in offset space.
        let moved = Rect {
            left: 250.0,
            top: 150.0,
            ..card
        };
        let bounds = DragBounds::new(container, moved, Point::new(50.0, 50.0));
        assert_eq!(bounds.x, Range { min: -200.0, max: 600.0 });
    }

    #[test]
    fn oversized_card_gets_a_degenerate_range() {
        let container = Rect {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let card = Rect {
            left: 0.0,
            top: 0.0,
            width: 300.0,
            height: 50.0,
        };

        let bounds = DragBounds::new(container, card, Point::default());
        assert_eq!(bounds.x.min, bounds.x.max);
    }

    #[test]
    fn drag_session_overshoots_then_settles() {
        let bounds = DragBounds {
            x: Range { min: -100.0, max: 100.0 },
            y: Range { min: -100.0, max: 100.0 },
        };
        let session = DragSession::start(7, Point::new(500.0, 500.0), Point::new(20.0, 0.0), bounds);
        assert_eq!(session.pointer_id(), 7);

        assert_eq!(session.drag_to(Point::new(530.0, 480.0)), Point::new(50.0, -20.0));

        let stretched = session.drag_to(Point::new(780.0, 500.0));
        assert!(stretched.x > 100.0 && stretched.x < 300.0);

        assert_eq!(session.release(Point::new(780.0, 500.0)), Point::new(100.0, 0.0));
    }
}
