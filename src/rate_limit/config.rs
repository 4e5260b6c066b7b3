//! Rate limiter configuration.

use std::time::Duration;

/// Limits for one fixed-window limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of one counting window.
    pub window: Duration,
    /// Requests allowed per client per window.
    pub max_requests: u32,
    /// Message returned with a 429.
    pub message: String,
}

impl RateLimitConfig {
    /// General API limiter with the default rejection message.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            message: "Demasiadas solicitudes, por favor intente de nuevo más tarde.".to_string(),
        }
    }

    /// Search endpoint: 30 requests per 15 minutes.
    pub fn search() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 30,
            message: "Demasiadas búsquedas. Por favor, espere unos minutos antes de intentar nuevamente."
                .to_string(),
        }
    }

    /// Manual refresh endpoint: 5 requests per hour.
    pub fn update() -> Self {
        Self {
            window: Duration::from_secs(60 * 60),
            max_requests: 5,
            message: "Demasiadas solicitudes de actualización. Máximo 5 por hora.".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60), 100)
    }
}
