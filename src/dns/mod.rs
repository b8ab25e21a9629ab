//! DNS propagation checking
//!
//! - [`TxtLookup`] - seam over TXT resolution so the poll can be tested
//!   without live DNS
//! - [`PublicDnsLookup`] - production lookup against public resolvers
//! - [`PropagationChecker`] - bounded poll until the challenge record is
//!   visible and matches

mod propagation;

pub use propagation::{
    DnsCheckError, PropagationChecker, PropagationConfig, PublicDnsLookup, TxtLookup,
};
