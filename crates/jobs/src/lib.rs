mod prefetch;

pub use prefetch::PrefetchJob;
