pub mod evaluation;
pub mod question;
pub mod settings;
pub mod user;

pub use evaluation::*;
pub use question::*;
pub use settings::*;
pub use user::*;
