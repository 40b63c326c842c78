pub mod conversation;
pub mod field;
pub mod project;
pub mod quote;
pub mod rates;
