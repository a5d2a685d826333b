//! Unit tables and value formatting for the OpenHAB adapter (C2).
//!
//! Grounded on `lumehaven/adapters/openhab/units.py`: the default unit
//! table per quantity type, the `%f`/`%d`/`%s` state-pattern parser, and
//! the value formatter that strips a QuantityType's unit suffix before
//! applying it.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::signal::is_unavailable_sentinel;

/// Which measurement system's defaults `default_units` should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementSystem {
    Si,
    Us,
}

impl MeasurementSystem {
    /// Parse the `measurementSystem` value OpenHAB's `/rest` config reports.
    /// Anything other than the literal `"US"` falls back to SI — see
    /// `DESIGN.md` for why that fallback is silent but logged by the caller.
    pub fn parse(raw: &str) -> Self {
        if raw == "US" {
            MeasurementSystem::Us
        } else {
            MeasurementSystem::Si
        }
    }
}

fn si_units() -> &'static HashMap<&'static str, &'static str> {
    static SI: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    SI.get_or_init(|| {
        HashMap::from([
            ("Acceleration", "m/s²"),
            ("AmountOfSubstance", "mol"),
            ("Angle", ""),
            ("Area", "m²"),
            ("ArealDensity", "DU"),
            ("CatalyticActivity", "kat"),
            ("DataAmount", "bit"),
            ("DataTransferRate", "bit/s"),
            ("Density", "g/m³"),
            ("Dimensionless", "%"),
            ("ElectricPotential", "V"),
            ("ElectricCapacitance", "F"),
            ("ElectricCharge", "C"),
            ("ElectricConductance", "S"),
            ("ElectricConductivity", "S/m"),
            ("ElectricCurrent", "A"),
            ("ElectricInductance", "H"),
            ("ElectricResistance", "Ω"),
            ("Energy", "J"),
            ("Force", "N"),
            ("Frequency", "Hz"),
            ("Illuminance", "Lux"),
            ("Intensity", "W/m²"),
            ("Length", "m"),
            ("LuminousFlux", "lm"),
            ("LuminousIntensity", "cd"),
            ("MagneticFlux", "Wb"),
            ("MagneticFluxDensity", "T"),
            ("Mass", "g"),
            ("Power", "W"),
            ("Pressure", "Pa"),
            ("Radioactivity", "Bq"),
            ("RadiationDoseAbsorbed", "Gy"),
            ("RadiationDoseEffective", "Sv"),
            ("SolidAngle", "sr"),
            ("Speed", "m/s"),
            ("Temperature", "°C"),
            ("Time", "s"),
            ("Volume", "l"),
            ("VolumetricFlowRate", "l/min"),
        ])
    })
}

fn us_overrides() -> &'static HashMap<&'static str, &'static str> {
    static US: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    US.get_or_init(|| {
        HashMap::from([
            ("Length", "in"),
            ("Pressure", "inHg"),
            ("Speed", "mph"),
            ("Temperature", "°F"),
            ("Volume", "gal"),
            ("VolumetricFlowRate", "gal/min"),
        ])
    })
}

/// Default unit symbol per quantity type for `system`. `Us` returns the SI
/// table with the US overrides layered on top, matching the upstream's
/// "US is SI plus a handful of imperial overrides" semantics.
pub fn default_units(system: MeasurementSystem) -> HashMap<&'static str, &'static str> {
    let mut units = si_units().clone();
    if system == MeasurementSystem::Us {
        units.extend(us_overrides().iter());
    }
    units
}

/// Extract `(unit, format_str)` from an OpenHAB state-description pattern
/// such as `"%.1f °C"` or `"%d %%"`. Patterns that don't start with a
/// `%...[fds]` specifier fall back to `(pattern, "%s")`.
pub fn extract_unit_from_pattern(pattern: &str) -> (String, String) {
    match find_format_specifier(pattern) {
        Some(spec_end) => {
            let format_str = pattern[..=spec_end].to_string();
            let unit = pattern[spec_end + 1..].trim_start().replace("%%", "%");
            (unit, format_str)
        }
        None => (pattern.to_string(), "%s".to_string()),
    }
}

/// Index of the specifier character (`f`, `d`, or `s`) that terminates a
/// leading `%...` run, mirroring `(%\S*[fds])` anchored at position 0: the
/// specifier is the *last* such character before whitespace ends the run.
fn find_format_specifier(pattern: &str) -> Option<usize> {
    let bytes = pattern.as_bytes();
    if bytes.first() != Some(&b'%') {
        return None;
    }
    let mut end = 1;
    while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
        end += 1;
    }
    (1..end).rev().find(|&i| matches!(bytes[i], b'f' | b'd' | b's'))
}

/// `%`-style specifier, e.g. `%d`, `%.1f`, `%5.2f`.
struct FormatSpec {
    width: Option<usize>,
    precision: Option<usize>,
    kind: char,
}

fn parse_format_spec(format_str: &str) -> Option<FormatSpec> {
    let body = format_str.strip_prefix('%')?;
    let kind = body.chars().last()?;
    let spec = &body[..body.len() - kind.len_utf8()];
    let (width_part, precision_part) = match spec.split_once('.') {
        Some((w, p)) => (w, Some(p)),
        None => (spec, None),
    };
    let width = if width_part.is_empty() {
        None
    } else {
        width_part.parse().ok()
    };
    let precision = match precision_part {
        Some(p) if !p.is_empty() => p.parse().ok(),
        Some(_) => Some(0),
        None => None,
    };
    Some(FormatSpec {
        width,
        precision,
        kind,
    })
}

fn pad(s: String, width: Option<usize>) -> String {
    match width {
        Some(w) if s.len() < w => format!("{:>w$}", s, w = w),
        _ => s,
    }
}

/// Format a raw OpenHAB state string per `format_str`, stripping `unit`
/// first when `is_quantity_type` and the state carries that suffix.
///
/// `UNDEF`/`NULL` pass through unchanged. Values that fail to parse as a
/// number under a numeric format spec also pass through unchanged (after
/// unit-stripping and trimming), matching the upstream's "can't convert,
/// return as-is" fallback.
pub fn format_value(state: &str, unit: &str, format_str: &str, is_quantity_type: bool) -> String {
    if is_unavailable_sentinel(state) {
        return state.to_string();
    }
    if unit.is_empty() && format_str.is_empty() {
        return state.to_string();
    }

    let value = if is_quantity_type && !unit.is_empty() && state.ends_with(unit) {
        state[..state.len() - unit.len()].trim_end()
    } else {
        state.trim_end()
    };

    if let Some(spec) = parse_format_spec(format_str) {
        match spec.kind {
            'd' => {
                if let Ok(f) = value.parse::<f64>() {
                    return pad(format!("{}", f.round() as i64), spec.width);
                }
            }
            'f' => {
                if let Ok(f) = value.parse::<f64>() {
                    let precision = spec.precision.unwrap_or(6);
                    return pad(format!("{:.*}", precision, f), spec.width);
                }
            }
            _ => {}
        }
    }

    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_overlays_si() {
        let units = default_units(MeasurementSystem::Us);
        assert_eq!(units["Temperature"], "°F");
        assert_eq!(units["Pressure"], "inHg");
        // untouched by the US table, still falls through to SI
        assert_eq!(units["Energy"], "J");
    }

    #[test]
    fn si_is_unmodified() {
        let units = default_units(MeasurementSystem::Si);
        assert_eq!(units["Temperature"], "°C");
        assert!(!units.contains_key("nonexistent"));
    }

    #[test]
    fn extract_pattern_with_unit() {
        let (unit, fmt) = extract_unit_from_pattern("%.1f °C");
        assert_eq!(unit, "°C");
        assert_eq!(fmt, "%.1f");
    }

    #[test]
    fn extract_pattern_escaped_percent() {
        let (unit, fmt) = extract_unit_from_pattern("%d %%");
        assert_eq!(unit, "%");
        assert_eq!(fmt, "%d");
    }

    #[test]
    fn extract_pattern_plain_string() {
        let (unit, fmt) = extract_unit_from_pattern("%s");
        assert_eq!(unit, "");
        assert_eq!(fmt, "%s");
    }

    #[test]
    fn extract_pattern_without_specifier_falls_back() {
        let (unit, fmt) = extract_unit_from_pattern("no percent here");
        assert_eq!(unit, "no percent here");
        assert_eq!(fmt, "%s");
    }

    #[test]
    fn format_quantity_type_strips_unit_and_rounds() {
        assert_eq!(format_value("21.5678 °C", "°C", "%.1f", true), "21.6");
    }

    #[test]
    fn format_preserves_sentinels() {
        assert_eq!(format_value("UNDEF", "°C", "%.1f", true), "UNDEF");
        assert_eq!(format_value("NULL", "°C", "%.1f", true), "NULL");
    }

    #[test]
    fn format_plain_integer() {
        assert_eq!(format_value("42", "", "%d", false), "42");
    }

    #[test]
    fn format_non_numeric_passes_through() {
        assert_eq!(format_value("OPEN", "", "%s", false), "OPEN");
        assert_eq!(format_value("OPEN", "", "%d", false), "OPEN");
    }

    #[test]
    fn format_empty_unit_and_pattern_returns_state_verbatim() {
        assert_eq!(format_value("anything at all", "", "", false), "anything at all");
    }
}
