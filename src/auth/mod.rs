//! Authentication and authorization: tokens, session cookies, the path
//! middleware and the per-route role guard.

pub mod context;
pub mod cookies;
pub mod guard;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod rate_limit;
pub mod tokens;

pub use context::{Authenticated, RequestContext};
pub use policy::{Action, RolePolicy, RoleSet};
pub use tokens::TokenService;
