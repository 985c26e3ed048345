pub mod daemon;
pub mod download;
pub mod health;
pub mod init;
pub mod ls;
pub mod peers;
pub mod upload;
pub mod version;

pub use daemon::Daemon;
pub use download::Download;
pub use health::Health;
pub use init::Init;
pub use ls::Ls;
pub use peers::Peers;
pub use upload::Upload;
pub use version::Version;
