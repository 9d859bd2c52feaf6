use crate::error::MusicError;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, poise::ChoiceParameter)]
pub enum FilterKind {
    #[name = "timescale"]
    Timescale,
    #[name = "tremolo"]
    Tremolo,
    #[name = "vibrato"]
    Vibrato,
    #[name = "lowpass"]
    LowPass,
    #[name = "rotation"]
    Rotation,
    #[name = "equalizer"]
    Equalizer,
}

impl FilterKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Timescale => "Timescale",
            Self::Tremolo => "Tremolo",
            Self::Vibrato => "Vibrato",
            Self::LowPass => "Low Pass",
            Self::Rotation => "Rotation",
            Self::Equalizer => "Equalizer",
        }
    }
}

pub const EQUALIZER_BANDS: u8 = 15;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Timescale { speed: f64, pitch: f64, rate: f64 },
    Tremolo { frequency: f64, depth: f64 },
    Vibrato { frequency: f64, depth: f64 },
    LowPass { smoothing: f64 },
    Rotation { rotation_hz: f64 },
    Equalizer { bands: Vec<(u8, f64)> },
}

fn invalid(msg: impl Into<String>) -> MusicError {
    MusicError::InvalidFilterParameters(msg.into())
}

fn check_finite(values: &[f64]) -> Result<(), MusicError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(invalid("Filter values must be finite numbers."))
    }
}

fn check_wave(name: &str, frequency: f64, depth: f64) -> Result<(), MusicError> {
    check_finite(&[frequency, depth])?;
    if frequency <= 0.0 {
        return Err(invalid(format!("{name} frequency must be greater than 0.")));
    }
    if depth <= 0.0 || depth > 1.0 {
        return Err(invalid(format!("{name} depth must be within (0, 1].")));
    }
    Ok(())
}

impl Filter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Timescale { .. } => FilterKind::Timescale,
            Self::Tremolo { .. } => FilterKind::Tremolo,
            Self::Vibrato { .. } => FilterKind::Vibrato,
            Self::LowPass { .. } => FilterKind::LowPass,
            Self::Rotation { .. } => FilterKind::Rotation,
            Self::Equalizer { .. } => FilterKind::Equalizer,
        }
    }

    pub fn validate(&self) -> Result<(), MusicError> {
        match self {
            Self::Timescale { speed, pitch, rate } => {
                check_finite(&[*speed, *pitch, *rate])?;
                if *speed < 0.1 || *pitch < 0.1 || *rate < 0.1 {
                    return Err(invalid("Speed, pitch and rate must each be at least 0.1."));
                }
            }
            Self::Tremolo { frequency, depth } => check_wave("Tremolo", *frequency, *depth)?,
            Self::Vibrato { frequency, depth } => check_wave("Vibrato", *frequency, *depth)?,
            Self::LowPass { smoothing } => {
                check_finite(&[*smoothing])?;
                if *smoothing <= 1.0 {
                    return Err(invalid("Low pass smoothing must be greater than 1."));
                }
            }
            Self::Rotation { rotation_hz } => {
                check_finite(&[*rotation_hz])?;
                if *rotation_hz < 0.0 {
                    return Err(invalid("Rotation speed cannot be negative."));
                }
            }
            Self::Equalizer { bands } => {
                if bands.is_empty() {
                    return Err(invalid("Equalizer needs at least one band."));
                }
                for (band, gain) in bands {
                    check_finite(&[*gain])?;
                    if *band >= EQUALIZER_BANDS {
                        return Err(invalid(format!(
                            "Equalizer band must be between 0 and {}.",
                            EQUALIZER_BANDS - 1
                        )));
                    }
                    if !(-0.25..=1.0).contains(gain) {
                        return Err(invalid("Equalizer gain must be between -0.25 and 1.0."));
                    }
                }
            }
        }
        Ok(())
    }

    fn wire(&self) -> (&'static str, Value) {
        match self {
            Self::Timescale { speed, pitch, rate } => (
                "timescale",
                json!({ "speed": speed, "pitch": pitch, "rate": rate }),
            ),
            Self::Tremolo { frequency, depth } => (
                "tremolo",
                json!({ "frequency": frequency, "depth": depth }),
            ),
            Self::Vibrato { frequency, depth } => (
                "vibrato",
                json!({ "frequency": frequency, "depth": depth }),
            ),
            Self::LowPass { smoothing } => ("lowPass", json!({ "smoothing": smoothing })),
            Self::Rotation { rotation_hz } => ("rotation", json!({ "rotationHz": rotation_hz })),
            Self::Equalizer { bands } => (
                "equalizer",
                Value::Array(
                    bands
                        .iter()
                        .map(|(band, gain)| json!({ "band": band, "gain": gain }))
                        .collect(),
                ),
            ),
        }
    }
}

/// Active filters, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: BTreeMap<FilterKind, Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates then installs `filter`, returning the one it replaced.
    pub fn set(&mut self, filter: Filter) -> Result<Option<Filter>, MusicError> {
        filter.validate()?;
        Ok(self.filters.insert(filter.kind(), filter))
    }

    pub fn remove(&mut self, kind: FilterKind) -> Option<Filter> {
        self.filters.remove(&kind)
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn get(&self, kind: FilterKind) -> Option<&Filter> {
        self.filters.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = FilterKind> + '_ {
        self.filters.keys().copied()
    }

    /// Lavalink `filters` object for this set. Absent kinds are omitted,
    /// which the node treats as disabled.
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        for filter in self.filters.values() {
            let (key, value) = filter.wire();
            map.insert(key.to_string(), value);
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Filter::Timescale { speed: 0.05, pitch: 1.0, rate: 1.0 })]
    #[case(Filter::Timescale { speed: 1.0, pitch: 0.0, rate: 1.0 })]
    #[case(Filter::Tremolo { frequency: 0.0, depth: 0.5 })]
    #[case(Filter::Tremolo { frequency: 2.0, depth: 1.5 })]
    #[case(Filter::Vibrato { frequency: 2.0, depth: 0.0 })]
    #[case(Filter::LowPass { smoothing: 1.0 })]
    #[case(Filter::Rotation { rotation_hz: -0.2 })]
    #[case(Filter::Equalizer { bands: vec![(15, 0.1)] })]
    #[case(Filter::Equalizer { bands: vec![(0, 2.0)] })]
    #[case(Filter::Timescale { speed: f64::NAN, pitch: 1.0, rate: 1.0 })]
    fn rejected_filter_leaves_set_unchanged(#[case] filter: Filter) {
        let mut set = FilterSet::new();
        set.set(Filter::Rotation { rotation_hz: 0.2 }).unwrap();
        let before = set.clone();

        let err = set.set(filter).unwrap_err();
        assert!(matches!(err, MusicError::InvalidFilterParameters(_)));
        assert_eq!(set, before);
    }

    #[test]
    fn one_filter_per_kind() {
        let mut set = FilterSet::new();
        assert!(
            set.set(Filter::Timescale { speed: 1.2, pitch: 1.0, rate: 1.0 })
                .unwrap()
                .is_none()
        );
        let replaced = set
            .set(Filter::Timescale { speed: 0.8, pitch: 1.1, rate: 1.0 })
            .unwrap();
        assert!(replaced.is_some());
        assert_eq!(set.kinds().count(), 1);
    }

    #[test]
    fn wire_format_uses_lavalink_keys() {
        let mut set = FilterSet::new();
        set.set(Filter::LowPass { smoothing: 20.0 }).unwrap();
        set.set(Filter::Rotation { rotation_hz: 0.2 }).unwrap();
        set.set(Filter::Equalizer { bands: vec![(0, 0.25), (1, 0.1)] })
            .unwrap();

        let wire = set.to_wire();
        assert_eq!(wire["lowPass"]["smoothing"], 20.0);
        assert_eq!(wire["rotation"]["rotationHz"], 0.2);
        assert_eq!(wire["equalizer"][1]["band"], 1);
        assert!(wire.get("timescale").is_none());
    }

    #[test]
    fn remove_disables_kind() {
        let mut set = FilterSet::new();
        set.set(Filter::Tremolo { frequency: 2.0, depth: 0.5 }).unwrap();
        assert!(set.remove(FilterKind::Tremolo).is_some());
        assert!(set.is_empty());
        assert!(set.remove(FilterKind::Tremolo).is_none());
    }
}
