mod mocks;

pub use mocks::{MockPolicySource, MockPolicyStore};
