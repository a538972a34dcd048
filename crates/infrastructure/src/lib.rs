pub mod cache;
pub mod dane;
pub mod dns;
pub mod mta_sts;
pub mod socketmap;
