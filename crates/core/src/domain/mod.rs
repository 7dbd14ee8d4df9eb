pub mod load;
pub mod negotiation;
pub mod relevance;
