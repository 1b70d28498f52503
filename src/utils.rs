//! Unit conversions between the API's integer hundredths and Celsius.

/// Hundredths of a degree to Celsius.
pub fn hundredths_to_celsius(value: i64) -> f64 {
    value as f64 / 100.0
}

/// Hundredths of a degree to whole degrees, truncating toward zero.
pub fn hundredths_to_whole_degrees(value: i64) -> i64 {
    value / 100
}

/// Celsius to hundredths of a degree, rounded to the nearest integer so that
/// e.g. 21.3 does not end up as 2129.
pub fn celsius_to_hundredths(celsius: f64) -> i64 {
    (celsius * 100.0).round() as i64
}

/// Round a hundredths value up to the next whole degree (2137 -> 2200).
/// Saturates at the largest whole degree that fits in `i64`.
pub fn ceil_to_whole_degree(value: i64) -> i64 {
    let floor = value.div_euclid(100);
    let ceil = if value.rem_euclid(100) == 0 { floor } else { floor + 1 };
    ceil.checked_mul(100).unwrap_or_else(|| floor * 100)
}
