//! Primitive coercions that follow what form inputs actually contain.

use crate::value::Value;

/// ECMAScript-style number formatting: integral values print without a fraction.
#[must_use]
pub fn number_to_string(n: f64) -> String {
	if n.is_nan() {
		"NaN".to_owned()
	} else if n.is_infinite() {
		if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
	} else if n == 0.0 {
		"0".to_owned()
	} else if n.fract() == 0.0 && n.abs() < 1e21 {
		format!("{:.0}", n)
	} else {
		n.to_string()
	}
}

/// Parses a number the way people type it.
///
/// Thousands separators (spaces, apostrophes, underscores and the minority separator of `,`/`.`) are dropped,
/// a lone or trailing decimal comma becomes a point and typographic minus signs become `-`.
/// Returns [`None`] for empty or unparsable input.
#[must_use]
pub fn parse_locale_number(text: &str) -> Option<f64> {
	let mut s: String = text
		.trim()
		.chars()
		.filter_map(|c| match c {
			'\u{2212}' | '\u{2012}' | '\u{2013}' | '\u{fe63}' | '\u{ff0d}' => Some('-'),
			' ' | '\u{a0}' | '\u{202f}' | '\u{2009}' | '\'' | '\u{2019}' | '_' => None,
			c => Some(c),
		})
		.collect();

	let commas = s.matches(',').count();
	let points = s.matches('.').count();
	match (commas, points) {
		(0, 0) | (0, 1) => {}
		(0, _) => s.retain(|c| c != '.'),
		(1, 0) => s = s.replace(',', "."),
		(_, 0) => s.retain(|c| c != ','),
		_ => {
			let last_comma = s.rfind(',');
			let last_point = s.rfind('.');
			if last_comma > last_point {
				s.retain(|c| c != '.');
				s = s.replace(',', ".");
			} else {
				s.retain(|c| c != ',');
			}
		}
	}

	if s.is_empty() {
		return None;
	}
	// `f64::from_str` also takes "inf" and "nan", which nobody means to type into a number field.
	s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Boolean coercion aware of the strings form controls produce. `null` stays [`None`].
#[must_use]
pub fn to_boolean(value: &Value) -> Option<bool> {
	match value {
		Value::Null => None,
		Value::String(s) => Some(match s.trim().to_ascii_lowercase().as_str() {
			"true" | "1" | "on" | "yes" => true,
			"false" | "0" | "off" | "no" | "" => false,
			_ => true,
		}),
		other => Some(other.is_truthy()),
	}
}
