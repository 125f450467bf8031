pub mod account;
pub mod answer;
pub mod badge;
pub mod notification;
pub mod pagination;
pub mod question;
pub mod stats;
pub mod tag;
pub mod vote;
