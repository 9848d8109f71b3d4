pub mod body;
pub mod dispatch;
pub mod outcome;
pub mod probe;
pub mod store;
pub mod vars;
