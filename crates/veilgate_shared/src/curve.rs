use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }

    pub const fn flat(time: f32, value: f32) -> Self {
        Self::new(time, value, 0.0, 0.0)
    }
}

/// Cubic Hermite curve over sorted keyframes. Outside the key range the
/// curve holds the first or last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadeCurve {
    keys: Vec<Keyframe>,
}

impl Default for FadeCurve {
    fn default() -> Self {
        Self::linear(0.0, 0.0, 1.0, 1.0)
    }
}

impl FadeCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.retain(|key| key.time.is_finite() && key.value.is_finite());
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn linear(start_time: f32, start_value: f32, end_time: f32, end_value: f32) -> Self {
        let span = end_time - start_time;
        let slope = if span.abs() > f32::EPSILON {
            (end_value - start_value) / span
        } else {
            0.0
        };
        Self::new(vec![
            Keyframe::new(start_time, start_value, slope, slope),
            Keyframe::new(end_time, end_value, slope, slope),
        ])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn evaluate(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let upper = self.keys.partition_point(|key| key.time <= time);
        let k0 = self.keys[upper - 1];
        let k1 = self.keys[upper];
        let span = k1.time - k0.time;
        if span <= f32::EPSILON {
            return k1.value;
        }

        let t = (time - k0.time) / span;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * k0.value + h10 * span * k0.out_tangent + h01 * k1.value + h11 * span * k1.in_tangent
    }
}

/// Fades the portal toward its blend color over the last stretch of the
/// rendering distance.
pub fn default_color_blend() -> FadeCurve {
    FadeCurve::new(vec![
        Keyframe::flat(0.0, 0.0),
        Keyframe::flat(0.6, 0.0),
        Keyframe::flat(1.0, 1.0),
    ])
}

pub fn default_albedo_alpha() -> FadeCurve {
    FadeCurve::new(vec![
        Keyframe::new(0.0, 0.0, 0.0, 0.0),
        Keyframe::new(0.01, 0.0, 0.0, 45.0),
        Keyframe::new(0.03, 0.9, 45.0, 0.0),
        Keyframe::new(0.6, 0.9, 0.0366, 0.0366),
        Keyframe::flat(1.0, 2.2),
    ])
}

pub fn default_refraction() -> FadeCurve {
    FadeCurve::new(vec![
        Keyframe::new(0.0, 0.0, -0.000_312_7, -0.000_312_7),
        Keyframe::flat(0.05, 0.0),
        Keyframe::new(0.994_62, 0.198_986, -0.005_004, -0.005_004),
    ])
}
