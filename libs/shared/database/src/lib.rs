pub mod snapshot;
pub mod supabase;

pub use snapshot::JsonSnapshot;
pub use supabase::SupabaseClient;
