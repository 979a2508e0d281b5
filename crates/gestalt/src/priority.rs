//! Discrete priority controlling decoder selection and post-processor
//! ordering. Higher wins.

use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Priority {
    Lowest,
    Low,
    Medium,
    High,
    VeryHigh,
}
