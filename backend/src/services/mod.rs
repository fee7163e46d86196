pub mod chat;
pub mod hits;
pub mod invite;
pub mod mailer;
pub mod token_store;
