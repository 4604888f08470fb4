// OAuth2 JWT-bearer authentication
//
// Builds RS256-signed assertions and exchanges them for bearer tokens.

mod token;

pub use token::{AuthContext, AuthTokenProvider, BearerToken, Claims};
