pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub const WATT_HOURS_PER_KILOWATT_HOUR: u32 = 1_000;
pub const MINUTES_PER_HOUR: u32 = 60;
pub const SECONDS_PER_MINUTE: u32 = 60;
pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const MONTHS_PER_YEAR: u32 = 12;

/// Integrate a mean power reading over an interval to obtain energy.
pub(crate) fn watts_to_kwh(watts: f64, duration_hours: f64) -> f64 {
    watts * duration_hours / WATTS_PER_KILOWATT as f64
}

pub(crate) fn watt_hours_to_kwh(watt_hours: f64) -> f64 {
    watt_hours / WATT_HOURS_PER_KILOWATT_HOUR as f64
}
