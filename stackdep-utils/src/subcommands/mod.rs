mod extract;
pub use self::extract::ExtractApp;

mod nonprojective;
pub use self::nonprojective::NonProjectiveApp;

mod parse;
pub use self::parse::ParseApp;

mod test;
pub use self::test::TestApp;

mod train;
pub use self::train::TrainApp;
