//! Screen state for the dashboard and a single chatroom.
//!
//! Views read from and call into the stores; they own nothing beyond what is
//! needed to render (search text, loaded page, open/closed).

mod chat;
mod dashboard;

pub use chat::ChatView;
pub use dashboard::DashboardView;
