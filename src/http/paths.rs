//! Route paths served by the check service.

pub const HEALTH: &str = "/health";
pub const ABOUT: &str = "/about";
pub const CHECK: &str = "/v1/check";
