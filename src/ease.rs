//! Easing curves for spawn rates and per-particle attributes.
//!
//! Every animated attribute in pfx is a `{start, end}` pair blended by a
//! normalized time factor `t`. The [`Easing`] kind reshapes `t` before the
//! blend:
//!
//! | Kind | Factor |
//! |------|--------|
//! | [`Easing::Linear`] | `t` |
//! | [`Easing::EaseIn`] | `t^5` |
//! | [`Easing::EaseOut`] | `1 - (1 - t)^5` |
//!
//! The factors use integer powers, so they are defined for any real `t`.
//! Callers keep `t` near `[0, 1]` but values outside extrapolate instead of
//! producing NaN.
//!
//! # Example
//!
//! ```
//! use pfx::ease::{ease, Easing};
//!
//! assert_eq!(ease(Easing::Linear, 2.0_f32, 4.0, 0.5), 3.0);
//! assert_eq!(ease(Easing::EaseIn, 2.0_f32, 4.0, 1.0), 4.0);
//! ```

use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Easing curve kind.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Easing {
    /// Affine blend.
    #[default]
    #[serde(alias = "linear")]
    Linear,
    /// Slow start, `t^5`.
    #[serde(alias = "ease_in", alias = "easein")]
    EaseIn,
    /// Slow finish, `1 - (1 - t)^5`.
    #[serde(alias = "ease_out", alias = "easeout")]
    EaseOut,
}

impl Easing {
    pub const ALL: [Self; 3] = [Self::Linear, Self::EaseIn, Self::EaseOut];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::EaseIn => "EaseIn",
            Self::EaseOut => "EaseOut",
        }
    }

    /// Reshape a linear factor.
    #[inline]
    pub fn factor(self, t: f32) -> f32 {
        match self {
            Self::Linear => t,
            Self::EaseIn => t.powi(5),
            Self::EaseOut => 1.0 - (1.0 - t).powi(5),
        }
    }

    /// Blend `start` to `end` at `t` through this curve.
    #[inline]
    pub fn ease<T: Lerp>(self, start: T, end: T, t: f32) -> T {
        start.lerp_to(end, self.factor(t))
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown easing name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown easing '{0}'")]
pub struct UnknownEasing(pub String);

impl FromStr for Easing {
    type Err = UnknownEasing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "linear" => Ok(Self::Linear),
            "easein" => Ok(Self::EaseIn),
            "easeout" => Ok(Self::EaseOut),
            _ => Err(UnknownEasing(s.to_string())),
        }
    }
}

/// Blend `start` to `end` at `t` with the given easing kind.
#[inline]
pub fn ease<T: Lerp>(kind: Easing, start: T, end: T, t: f32) -> T {
    kind.ease(start, end, t)
}

/// Values that can be blended by an easing curve.
///
/// The blend is written as `start * (1 - t) + end * t` so both endpoints are
/// reproduced exactly at `t == 0` and `t == 1`.
pub trait Lerp: Copy {
    fn lerp_to(self, end: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp_to(self, end: Self, t: f32) -> Self {
        self * (1.0 - t) + end * t
    }
}

impl Lerp for Vec2 {
    #[inline]
    fn lerp_to(self, end: Self, t: f32) -> Self {
        self * (1.0 - t) + end * t
    }
}

impl Lerp for Vec3 {
    #[inline]
    fn lerp_to(self, end: Self, t: f32) -> Self {
        self * (1.0 - t) + end * t
    }
}

impl Lerp for Vec4 {
    #[inline]
    fn lerp_to(self, end: Self, t: f32) -> Self {
        self * (1.0 - t) + end * t
    }
}

/// An eased `{start, end}` attribute.
///
/// `easing: None` marks an optional slot that is switched off (for example a
/// geometry particle that emits no light).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct EaseCurve<T> {
    #[serde(
        rename = "function",
        alias = "easing",
        default,
        serialize_with = "serialize_optional_easing",
        deserialize_with = "deserialize_optional_easing"
    )]
    pub easing: Option<Easing>,
    pub start: T,
    pub end: T,
}

impl<T: Lerp> EaseCurve<T> {
    pub fn new(easing: Easing, start: T, end: T) -> Self {
        Self {
            easing: Some(easing),
            start,
            end,
        }
    }

    /// A curve holding `value` for the whole lifetime.
    pub fn constant(value: T) -> Self {
        Self::new(Easing::Linear, value, value)
    }

    /// A switched-off slot.
    pub fn disabled(value: T) -> Self {
        Self {
            easing: None,
            start: value,
            end: value,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.easing.is_some()
    }

    /// Sample at `t`, or `None` for a switched-off slot.
    #[inline]
    pub fn sample(&self, t: f32) -> Option<T> {
        self.easing.map(|kind| kind.ease(self.start, self.end, t))
    }

    /// Sample at `t`, falling back to `start` for a switched-off slot.
    #[inline]
    pub fn sample_or_start(&self, t: f32) -> T {
        self.sample(t).unwrap_or(self.start)
    }
}

fn serialize_optional_easing<S>(easing: &Option<Easing>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match easing {
        Some(kind) => serializer.serialize_str(kind.label()),
        None => serializer.serialize_str("None"),
    }
}

fn deserialize_optional_easing<'de, D>(deserializer: D) -> Result<Option<Easing>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    match name.as_deref() {
        None | Some("None") | Some("none") | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_exact() {
        for kind in Easing::ALL {
            assert_eq!(ease(kind, 0.1_f32, 0.7, 0.0), 0.1, "{kind} at 0");
            assert_eq!(ease(kind, 0.1_f32, 0.7, 1.0), 0.7, "{kind} at 1");
        }
    }

    #[test]
    fn test_midpoints() {
        assert_eq!(ease(Easing::Linear, 0.0_f32, 10.0, 0.5), 5.0);
        // 0.5^5 = 1/32
        assert!((ease(Easing::EaseIn, 0.0_f32, 32.0, 0.5) - 1.0).abs() < 1e-5);
        assert!((ease(Easing::EaseOut, 0.0_f32, 32.0, 0.5) - 31.0).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_range_extrapolates() {
        for kind in Easing::ALL {
            for t in [-1.5_f32, -0.1, 1.1, 3.0] {
                assert!(ease(kind, 1.0_f32, 2.0, t).is_finite(), "{kind} at {t}");
            }
        }
        assert_eq!(ease(Easing::Linear, 0.0_f32, 1.0, 2.0), 2.0);
    }

    #[test]
    fn test_vector_ease() {
        let start = Vec4::new(1.0, 1.0, 1.0, 1.0);
        let end = Vec4::new(1.0, 0.0, 0.0, 0.0);
        assert_eq!(ease(Easing::EaseOut, start, end, 1.0), end);
        assert_eq!(ease(Easing::EaseIn, start, end, 0.0), start);
        let mid = ease(Easing::Linear, Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0), 0.5);
        assert_eq!(mid, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("linear".parse::<Easing>(), Ok(Easing::Linear));
        assert_eq!("EaseIn".parse::<Easing>(), Ok(Easing::EaseIn));
        assert_eq!("ease_out".parse::<Easing>(), Ok(Easing::EaseOut));
        let err = "bounce".parse::<Easing>().unwrap_err();
        assert_eq!(err, UnknownEasing("bounce".into()));
        assert_eq!(err.to_string(), "unknown easing 'bounce'");
    }

    #[test]
    fn test_disabled_curve() {
        let curve = EaseCurve::disabled(3.0_f32);
        assert_eq!(curve.sample(0.5), None);
        assert_eq!(curve.sample_or_start(0.5), 3.0);

        let curve = EaseCurve::new(Easing::Linear, 0.0_f32, 2.0);
        assert_eq!(curve.sample(0.25), Some(0.5));
    }

    #[test]
    fn test_curve_json_names() {
        let curve: EaseCurve<f32> =
            serde_json::from_str(r#"{"function": "EaseOut", "start": 1.0, "end": 0.0}"#).unwrap();
        assert_eq!(curve.easing, Some(Easing::EaseOut));

        let curve: EaseCurve<f32> =
            serde_json::from_str(r#"{"function": "None", "start": 0.0, "end": 0.0}"#).unwrap();
        assert_eq!(curve.easing, None);

        let json = serde_json::to_string(&EaseCurve::disabled(0.0_f32)).unwrap();
        assert!(json.contains("\"None\""));
    }
}
