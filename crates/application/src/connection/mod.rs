mod manager;
mod read_loop;
mod session;

pub use manager::ConnectionManager;
pub use read_loop::ReadLoop;
pub use session::SharedSession;
