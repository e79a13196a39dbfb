//! Credential minting, verification and request identity.
//! Keep the public surface thin and split implementation across sub-modules.

mod claims;
mod codec;
mod issuer;
pub mod password;
mod principal;
mod validator;

pub use claims::{AccessClaims, RefreshClaims, Role};
pub use codec::TokenCodec;
pub use issuer::{TokenIssuer, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};
pub use principal::Principal;
pub use validator::{TokenValidator, BEARER_PREFIX};
