//! Page objects: named operations over one dashboards screen
//!
//! Each page object borrows a [`Commands`](crate::commands::Commands) and
//! holds no state of its own.

pub mod home;
pub mod login;

pub use home::HomePage;
pub use login::LoginPage;
