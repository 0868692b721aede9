pub mod aggregate;
pub mod calendar;
pub mod classify;
pub mod cost;
pub mod forecast;
pub mod normalize;
pub mod rank;
pub mod tariff;
pub mod units;
