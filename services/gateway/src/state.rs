use crate::intake::OrderIntake;
use crate::rate_limit::RateLimiter;
use matching_engine::prices::MarketPrices;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<OrderIntake>,
    pub prices: MarketPrices,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(intake: OrderIntake, prices: MarketPrices) -> Self {
        Self {
            intake: Arc::new(intake),
            prices,
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }
}
