mod resolver;
mod tlsa;

pub use resolver::DaneResolver;
pub use tlsa::is_tlsa_usable;
