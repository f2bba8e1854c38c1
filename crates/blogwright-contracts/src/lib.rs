//! Data contracts and pure logic for the blog generation client: the event stream decoder,
//! the transcript state machine, section analysis and image insertion.

pub mod chat;
pub mod conversation;
pub mod document;
pub mod images;
pub mod journal;
pub mod markup;
pub mod models;
pub mod session;
pub mod stream;
