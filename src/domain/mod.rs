pub mod credentials;
pub mod session;
pub mod story;

pub use credentials::CredentialProblem;
pub use session::{Session, Settings};
pub use story::{NewStory, RemoteKeys, Story};
