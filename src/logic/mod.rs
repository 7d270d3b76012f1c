pub mod compensation;
pub mod formatting;
pub mod record;
