pub mod clock;
pub mod store;
pub mod file_store;
pub mod supabase_store;
pub mod slots;
pub mod conflict;
pub mod ledger;
pub mod session;
pub mod booking;

pub use clock::*;
pub use store::*;
pub use file_store::*;
pub use supabase_store::*;
pub use slots::*;
pub use conflict::*;
pub use ledger::*;
pub use session::*;
pub use booking::*;
