//! Route paths of the mobile API.

/// Prefix shared by the auth endpoints; also the refresh cookie path.
pub const MOBILE_AUTH_PREFIX: &str = "/api/mobile/auth";

pub const POST_MOBILE_AUTH_LOGIN: &str = "/api/mobile/auth/login";
pub const POST_MOBILE_AUTH_REFRESH: &str = "/api/mobile/auth/refresh";
pub const POST_MOBILE_AUTH_LOGOUT: &str = "/api/mobile/auth/logout";
pub const POST_MOBILE_AUTH_LOGOUT_DEVICE: &str = "/api/mobile/auth/logout-device";
pub const POST_MOBILE_AUTH_LOGOUT_ALL: &str = "/api/mobile/auth/logout-all";
pub const POST_MOBILE_AUTH_CHALLENGE: &str = "/api/mobile/auth/challenge";
pub const POST_MOBILE_AUTH_CHALLENGE_VERIFY: &str = "/api/mobile/auth/challenge/verify";
pub const GET_MOBILE_ME: &str = "/api/mobile/me";
pub const GET_MOBILE_SESSION: &str = "/api/mobile/session";
