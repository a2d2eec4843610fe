//! Damped spring curves rendered as CSS `linear()` easings, so the Web Animations API
//! can play a spring without a JavaScript tweening library.

const REST_DISPLACEMENT: f64 = 0.005;
const SCAN_STEP_SECONDS: f64 = 0.001;
const MAX_SETTLE_SECONDS: f64 = 10.0;

/// A spring curve baked for one animation: how long it runs and the easing to run it with.
#[derive(Clone, Debug, PartialEq)]
pub struct SpringEasing {
    pub duration_ms: f64,
    pub css: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

impl Default for Spring {
    fn default() -> Self {
        Self {
            stiffness: 200.0,
            damping: 15.0,
            mass: 1.0,
        }
    }
}

impl Spring {
    fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    /// Remaining distance to the target for a spring released from rest at distance 1.
    pub fn displacement(&self, t: f64) -> f64 {
        let omega = self.natural_frequency();
        let zeta = self.damping_ratio();

        if (zeta - 1.0).abs() < 1e-6 {
            return (-omega * t).exp() * (1.0 + omega * t);
        }

        if zeta < 1.0 {
            let damped = omega * (1.0 - zeta * zeta).sqrt();
            let envelope = (-zeta * omega * t).exp();
            return envelope * ((damped * t).cos() + (zeta * omega / damped) * (damped * t).sin());
        }

        let root = (zeta * zeta - 1.0).sqrt();
        let slow = -omega * (zeta - root);
        let fast = -omega * (zeta + root);
        (fast * (slow * t).exp() - slow * (fast * t).exp()) / (fast - slow)
    }

    pub fn progress(&self, t: f64) -> f64 {
        1.0 - self.displacement(t)
    }

    /// Seconds until the displacement stays below the rest threshold for good.
    pub fn settle_duration(&self) -> f64 {
        let mut last_moving = 0.0;
        let mut t = 0.0;

        while t <= MAX_SETTLE_SECONDS {
            if self.displacement(t).abs() >= REST_DISPLACEMENT {
                last_moving = t;
            }
            t += SCAN_STEP_SECONDS;
        }

        (last_moving + SCAN_STEP_SECONDS).min(MAX_SETTLE_SECONDS)
    }

    pub fn settle_millis(&self) -> f64 {
        (self.settle_duration() * 1_000.0).round()
    }

    pub fn easing(&self, samples: usize) -> SpringEasing {
        SpringEasing {
            duration_ms: self.settle_millis(),
            css: self.linear_easing(samples),
        }
    }

    pub fn linear_easing(&self, samples: usize) -> String {
        let samples = samples.max(2);
        let duration = self.settle_duration();
        let last = samples - 1;

        let stops = (0..samples)
            .map(|index| {
                if index == last {
                    return "1".to_string();
                }
                let t = duration * index as f64 / last as f64;
                format!("{:.4}", self.progress(t))
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("linear({stops})")
    }
}
