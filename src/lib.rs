pub mod flow;
pub mod trip;
