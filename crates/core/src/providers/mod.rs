pub mod fetcher;
pub mod reference;
pub mod traits;

// Upstream implementations
pub mod coingecko;
