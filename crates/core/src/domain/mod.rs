pub mod analysis;
pub mod insight;
pub mod pattern;
pub mod recommendation;
pub mod record;
