#![allow(unused_imports)]

mod mock_dns;
mod mock_sources;

pub use mock_dns::{addr, authenticated, mx, tlsa, txt, unauthenticated, MockDnsExchange};
pub use mock_sources::MockPolicySource;
